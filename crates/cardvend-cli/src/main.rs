//! Card kiosk simulator binary.
//!
//! Wires the control core to mock peripherals and drives it the way the
//! target board's main loop would: a 10 ms tick on a current-thread
//! runtime. A line console stands in for the physical world; type `help`
//! at the prompt to see what it can do.

mod console;

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use cardvend_core::types::{BillRouting, Scene, UnitId};
use cardvend_hardware::Key;
use cardvend_hardware::mock::{
    MockBillAcceptor, MockBillAcceptorHandle, MockClock, MockCommandSource,
    MockCommandSourceHandle, MockDispenser, MockDispenserHandle, MockDisplay, MockDisplayHandle,
    MockKeypadMatrix, MockKeypadMatrixHandle, MockStatusSink, MockStatusSinkHandle,
};
use cardvend_hardware::store::JsonFileStore;
use cardvend_kiosk::{Kiosk, KioskPorts, SystemCommand};

use crate::console::ConsoleCommand;

const TICK: Duration = Duration::from_millis(10);

/// Holds a scripted key past the debounce window.
const TAP_HOLD: Duration = Duration::from_millis(80);

/// Holds the Enter+Cancel chord past the long-press threshold.
const MENU_HOLD: Duration = Duration::from_millis(3_300);

/// Gap after a release so the matrix gets sampled idle between keys.
const KEY_REST: Duration = Duration::from_millis(80);

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    tracing::info!("Cardvend simulator v{}", env!("CARGO_PKG_VERSION"));

    let store_path = std::env::var("CARDVEND_CONFIG")
        .unwrap_or_else(|_| "cardvend-config.json".to_string());
    let store = JsonFileStore::new(store_path)?;
    tracing::info!(path = %store.path().display(), "Config store");

    let sim = Sim::new(Box::new(store));
    run(sim).await
}

async fn run(mut sim: Sim) -> anyhow::Result<()> {
    let mut ticker = tokio::time::interval(TICK);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("type `help` for console commands");
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                sim.script.service(&sim.keys);
                if let Some(SystemCommand::Reset) = sim.kiosk.tick(TICK) {
                    tracing::info!("System reset requested; exiting for the supervisor to restart");
                    break;
                }
                sim.pump_outputs();
            }
            line = lines.next_line() => {
                match line {
                    Ok(Some(line)) => {
                        if !sim.apply(&line) {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        tracing::warn!(error = %e, "Console read failed");
                        break;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted; shutting down");
                break;
            }
        }
    }
    Ok(())
}

/// The kiosk plus the mock-side handles the console drives.
struct Sim {
    kiosk: Kiosk,
    bills: MockBillAcceptorHandle,
    units: MockDispenserHandle,
    keys: MockKeypadMatrixHandle,
    screen: MockDisplayHandle,
    channel: MockStatusSinkHandle,
    remote: MockCommandSourceHandle,
    script: KeyScript,
    last_scene: Option<Scene>,
}

impl Sim {
    fn new(store: Box<dyn cardvend_hardware::traits::ConfigStore>) -> Self {
        let (acceptor, bills) = MockBillAcceptor::new();
        let (dispenser, units) = MockDispenser::new();
        let (keypad, keys) = MockKeypadMatrix::new();
        let (display, screen) = MockDisplay::new();
        let (clock, _wall_clock) = MockClock::new();
        let (status, channel) = MockStatusSink::new();
        let (commands, remote) = MockCommandSource::new();
        let kiosk = Kiosk::new(KioskPorts {
            acceptor: Box::new(acceptor),
            dispenser: Box::new(dispenser),
            keypad: Box::new(keypad),
            display: Box::new(display),
            clock: Box::new(clock),
            store,
            status: Box::new(status),
            commands: Box::new(commands),
        });
        Sim {
            kiosk,
            bills,
            units,
            keys,
            screen,
            channel,
            remote,
            script: KeyScript::new(),
            last_scene: None,
        }
    }

    /// Handle one console line. Returns `false` when the operator quits.
    fn apply(&mut self, line: &str) -> bool {
        match console::parse(line) {
            Ok(None) => true,
            Ok(Some(command)) => self.dispatch(command),
            Err(message) => {
                println!("{message}");
                true
            }
        }
    }

    fn dispatch(&mut self, command: ConsoleCommand) -> bool {
        match command {
            ConsoleCommand::Help => println!("{}", console::HELP),
            ConsoleCommand::Show => self.show(),
            ConsoleCommand::Bill(denomination) => {
                self.bills.insert_bill(BillRouting::Stacked, denomination);
                println!("inserted a {} bill", denomination.value());
            }
            ConsoleCommand::Keys(keys) => {
                for key in keys {
                    self.script.tap(key);
                }
            }
            ConsoleCommand::Menu => {
                self.script.chord(vec![Key::Enter, Key::Cancel], MENU_HOLD);
            }
            ConsoleCommand::CardAtGate(unit) => self.units.set_card_at_gate(unit, true),
            ConsoleCommand::TakeCard(unit) => self.units.set_card_at_gate(unit, false),
            ConsoleCommand::SetHealth(unit, health) => self.units.set_health(unit, health),
            ConsoleCommand::RemoteCommand(payload) => self.remote.push_command(payload),
            ConsoleCommand::RemoteConfig(payload) => self.remote.push_config(payload),
            ConsoleCommand::Quit => return false,
        }
        true
    }

    /// Print a one-shot summary of everything the core knows.
    fn show(&self) {
        let config = self.kiosk.settings().borrow().snapshot();
        println!("state: {}", self.kiosk.state());
        println!(
            "balance: {}  price: {}  cards: {} (day {} month {})  lifetime: {}",
            config.balance,
            config.card_price,
            config.total_cards,
            config.total_cards_day,
            config.total_cards_month,
            config.lifetime_total,
        );
        println!(
            "acceptor: {}  status: {}",
            if self.kiosk.acceptor().is_enabled() {
                "enabled"
            } else {
                "disabled"
            },
            self.kiosk.acceptor().status(),
        );
        for unit in [UnitId::A, UnitId::B] {
            let health = self.kiosk.dispenser().health(unit);
            println!(
                "unit {}: {}  error={} low={} empty={}",
                unit,
                self.kiosk.dispenser().unit_state(unit),
                health.error,
                health.low,
                health.empty,
            );
        }
    }

    /// Mirror display and transport activity onto the terminal.
    fn pump_outputs(&mut self) {
        let scene = self.screen.last_scene();
        if scene != self.last_scene {
            if let Some(scene) = &scene {
                println!("{}", render(scene));
            }
            self.last_scene = scene;
        }
        for (topic, payload) in self.channel.take_published() {
            tracing::debug!(%topic, %payload, "Published");
        }
    }
}

/// Render a scene the way the 2x16 panel would, near enough.
fn render(scene: &Scene) -> String {
    match scene {
        Scene::Idle {
            balance,
            card_price,
            time,
        } => format!("[lcd] {time}\n[lcd] bal {balance}  price {card_price}"),
        Scene::Working => "[lcd] dispensing...".to_string(),
        Scene::PasswordEntry { digits_entered } => {
            format!("[lcd] password: {}", "*".repeat(*digits_entered))
        }
        Scene::SettingMenu => "[lcd] setting: pick field 1-7".to_string(),
        Scene::SettingField { field, value } => format!("[lcd] {field}: {value}"),
    }
}

/// Replays console key input through the matrix with debounce-safe timing.
///
/// One scripted entry is a set of keys held together for a duration. Taps
/// and the menu chord both go through here so a console line can never
/// outrun the keypad's sampling.
struct KeyScript {
    queue: VecDeque<(Vec<Key>, Duration)>,
    down: Option<(Vec<Key>, Instant)>,
    rest_until: Option<Instant>,
}

impl KeyScript {
    fn new() -> Self {
        KeyScript {
            queue: VecDeque::new(),
            down: None,
            rest_until: None,
        }
    }

    fn tap(&mut self, key: Key) {
        self.queue.push_back((vec![key], TAP_HOLD));
    }

    fn chord(&mut self, keys: Vec<Key>, hold: Duration) {
        self.queue.push_back((keys, hold));
    }

    fn service(&mut self, matrix: &MockKeypadMatrixHandle) {
        let now = Instant::now();
        if let Some((keys, until)) = &self.down {
            if now < *until {
                return;
            }
            for key in keys {
                matrix.release(*key);
            }
            self.down = None;
            self.rest_until = Some(now + KEY_REST);
            return;
        }
        if let Some(rest) = self.rest_until {
            if now < rest {
                return;
            }
            self.rest_until = None;
        }
        if let Some((keys, hold)) = self.queue.pop_front() {
            for key in &keys {
                matrix.press(*key);
            }
            self.down = Some((keys, now + hold));
        }
    }
}
