//! Mock display panel for testing and development.
//!
//! Records every scene the core shows and the current alert overlays, so
//! tests can assert on what a customer would be seeing.

use crate::{
    Result,
    traits::DisplayPanel,
};
use cardvend_core::{AlertKind, Scene};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug)]
struct Inner {
    scenes: Vec<Scene>,
    alerts: HashSet<AlertKind>,
}

/// Mock display panel.
///
/// # Examples
///
/// ```
/// use cardvend_hardware::mock::MockDisplay;
/// use cardvend_hardware::traits::DisplayPanel;
/// use cardvend_core::Scene;
///
/// let (mut display, handle) = MockDisplay::new();
///
/// display.show_scene(&Scene::Working).unwrap();
/// assert_eq!(handle.last_scene(), Some(Scene::Working));
/// ```
#[derive(Debug)]
pub struct MockDisplay {
    inner: Arc<Mutex<Inner>>,
}

impl MockDisplay {
    /// Create a new mock display.
    pub fn new() -> (Self, MockDisplayHandle) {
        let inner = Arc::new(Mutex::new(Inner {
            scenes: Vec::new(),
            alerts: HashSet::new(),
        }));

        let display = Self {
            inner: Arc::clone(&inner),
        };
        let handle = MockDisplayHandle { inner };

        (display, handle)
    }

    fn locked(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl DisplayPanel for MockDisplay {
    fn show_scene(&mut self, scene: &Scene) -> Result<()> {
        self.locked().scenes.push(scene.clone());
        Ok(())
    }

    fn set_alert(&mut self, alert: AlertKind, active: bool) -> Result<()> {
        let mut inner = self.locked();
        if active {
            inner.alerts.insert(alert);
        } else {
            inner.alerts.remove(&alert);
        }
        Ok(())
    }
}

/// Handle for inspecting a mock display.
#[derive(Debug, Clone)]
pub struct MockDisplayHandle {
    inner: Arc<Mutex<Inner>>,
}

impl MockDisplayHandle {
    fn locked(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The most recently shown scene.
    pub fn last_scene(&self) -> Option<Scene> {
        self.locked().scenes.last().cloned()
    }

    /// Every scene shown so far, in order.
    pub fn scenes(&self) -> Vec<Scene> {
        self.locked().scenes.clone()
    }

    /// How many scene updates were pushed.
    pub fn scene_count(&self) -> usize {
        self.locked().scenes.len()
    }

    /// Whether the given alert overlay is currently on.
    pub fn alert_active(&self, alert: AlertKind) -> bool {
        self.locked().alerts.contains(&alert)
    }

    /// Drop the recorded scene history (alert state is kept).
    pub fn clear_scenes(&self) {
        self.locked().scenes.clear();
    }
}
