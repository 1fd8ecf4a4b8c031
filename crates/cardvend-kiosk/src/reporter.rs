//! Periodic status snapshots and bill-accepted events on the status channel.
//!
//! Everything here is fire-and-forget. A failed publish drops the report and
//! the next interval produces a fresh one, so no queueing or retry state is
//! kept.

use serde::Serialize;
use tracing::debug;

use cardvend_core::constants::STATUS_REPORT_INTERVAL;
use cardvend_core::types::UnitId;
use cardvend_hardware::StatusSink;

use crate::acceptor::AcceptorManager;
use crate::dispenser::DispenserManager;
use crate::scheduler::{Scheduler, Timeout};
use crate::settings::SharedSettings;

// Single-letter keys keep the payload inside the transport's small-message
// limit.
#[derive(Debug, Serialize)]
struct UnitReport {
    e: bool,
    l: bool,
    m: bool,
}

#[derive(Debug, Serialize)]
struct StatusReport {
    v: String,
    b: u32,
    cp: u32,
    tc: u32,
    tcd: u32,
    tcm: u32,
    ta: u32,
    st: u8,
    ua: UnitReport,
    ub: UnitReport,
}

#[derive(Debug, Serialize)]
struct BillReport {
    value: u32,
}

/// Publishes the periodic full-status snapshot and immediate bill events.
pub struct StatusReporter {
    sink: Box<dyn StatusSink>,
    timer: Timeout,
    status_topic: String,
    bill_topic: String,
}

impl StatusReporter {
    pub fn new(sink: Box<dyn StatusSink>, scheduler: &Scheduler, device_id: &str) -> Self {
        StatusReporter {
            sink,
            // Born elapsed so the first snapshot goes out on the first step.
            timer: Timeout::new_elapsed(scheduler),
            status_topic: format!("{device_id}/rp/status"),
            bill_topic: format!("{device_id}/rp/bill_accepted"),
        }
    }

    /// Publish the full snapshot when the report interval elapses.
    pub fn step(
        &mut self,
        settings: &SharedSettings,
        acceptor: &AcceptorManager,
        dispenser: &DispenserManager,
    ) {
        if !self.timer.take_fired() {
            return;
        }
        self.timer.start(STATUS_REPORT_INTERVAL);
        let config = settings.borrow().snapshot();
        let report = StatusReport {
            v: config.version,
            b: config.balance,
            cp: config.card_price,
            tc: config.total_cards,
            tcd: config.total_cards_day,
            tcm: config.total_cards_month,
            ta: config.lifetime_total,
            st: acceptor.status().code(),
            ua: unit_report(dispenser, UnitId::A),
            ub: unit_report(dispenser, UnitId::B),
        };
        publish_json(self.sink.as_mut(), &self.status_topic, &report);
    }

    /// Immediate event carrying the accepted denomination value.
    pub fn report_bill_accepted(&mut self, value: u32) {
        publish_json(self.sink.as_mut(), &self.bill_topic, &BillReport { value });
    }
}

fn publish_json<T: Serialize>(sink: &mut dyn StatusSink, topic: &str, payload: &T) {
    let encoded = match serde_json::to_string(payload) {
        Ok(encoded) => encoded,
        Err(e) => {
            debug!(error = %e, "Report serialization failed");
            return;
        }
    };
    if let Err(e) = sink.publish(topic, &encoded) {
        debug!(error = %e, topic, "Status publish failed; report dropped");
    }
}

fn unit_report(dispenser: &DispenserManager, unit: UnitId) -> UnitReport {
    let health = dispenser.health(unit);
    UnitReport {
        e: health.error,
        l: health.low,
        m: health.empty,
    }
}
