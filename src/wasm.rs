#![cfg(feature = "wasm")]

use wasm_bindgen::prelude::*;

use crate::control::{Controller, ExternalEvent};
use crate::dsl::ClusterBuilder;
use crate::error::TribuneError;
use crate::time::Tick;

fn to_js(err: TribuneError) -> JsValue {
    JsValue::from_str(&err.to_string())
}

/// WASM binding for the controller.
///
/// The page owns the timer loop: it calls `tick()` every
/// `tick_interval_ms()` and re-renders from `state_json()`.
#[wasm_bindgen]
pub struct Simulator {
    ctl: Controller,
}

#[wasm_bindgen]
impl Simulator {
    /// The classic three-node cluster, seeded.
    #[wasm_bindgen(constructor)]
    pub fn new(seed: u64) -> Result<Simulator, JsValue> {
        console_error_panic_hook::set_once();
        let engine = ClusterBuilder::classic().seed(seed).build().map_err(to_js)?;
        Ok(Simulator {
            ctl: Controller::new(engine),
        })
    }

    /// Timer callback. Returns the new tick, or `undefined` while paused
    /// or previewing.
    pub fn tick(&mut self) -> Option<u64> {
        self.ctl.on_timer().map(Tick::value)
    }

    /// Single step regardless of pause.
    pub fn step(&mut self) -> u64 {
        self.ctl.step().value()
    }

    pub fn toggle_pause(&mut self) -> bool {
        self.ctl.toggle_pause()
    }

    pub fn is_paused(&self) -> bool {
        self.ctl.is_paused()
    }

    /// Returns the speed actually applied after clamping.
    pub fn set_speed(&mut self, speed: f64) -> Result<f64, JsValue> {
        self.ctl.set_speed(speed).map_err(to_js)
    }

    pub fn tick_interval_ms(&self) -> f64 {
        self.ctl.tick_interval().as_secs_f64() * 1000.0
    }

    /// Timeline hover. Returns `false` if the tick was never recorded.
    pub fn preview_at(&mut self, tick: u64) -> bool {
        self.ctl.preview_at(Tick::new(tick)).is_some()
    }

    pub fn stop_preview(&mut self) {
        self.ctl.stop_preview();
    }

    /// Timeline click. Returns `false` if the tick was never recorded.
    pub fn jump_to(&mut self, tick: u64) -> bool {
        self.ctl.jump_to(Tick::new(tick))
    }

    pub fn current_tick(&self) -> u64 {
        self.ctl.current_tick().value()
    }

    /// Apply an external event given as JSON, e.g.
    /// `{"type":"inject-message","from":1,"to":2,"kind":"heartbeat"}`.
    pub fn submit_event(&mut self, json: &str) -> Result<bool, JsValue> {
        let event: ExternalEvent =
            serde_json::from_str(json).map_err(|e| to_js(TribuneError::from(e)))?;
        let admitted = self.ctl.submit_external_event(event).map_err(to_js)?;
        Ok(admitted.is_some())
    }

    /// Visible nodes and packets as JSON.
    pub fn state_json(&self) -> Result<String, JsValue> {
        self.ctl.state_json().map_err(to_js)
    }

    /// Per-tick role summaries as JSON.
    pub fn timeline_json(&self) -> Result<String, JsValue> {
        self.ctl.timeline_json().map_err(to_js)
    }

    pub fn history_json(&self) -> Result<String, JsValue> {
        self.ctl.history_json().map_err(to_js)
    }
}
