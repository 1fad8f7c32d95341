//! Debounce and gesture recognition.
//!
//! Classified symbols go through a run-length debouncer; confirmed
//! transitions then drive the click timers and the detent register.
//! All timers count conversions and saturate.

use crate::config::GestureCfg;
use crate::event::{Event, EventSink};
use crate::symbol::{DetentRegister, Direction, Symbol};

/// Outcome of feeding one symbol.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Observation {
    /// Newly confirmed state, if this sample completed a transition.
    pub transition: Option<Symbol>,
    /// A long press fired; the caller should enter calibration.
    pub calibrate: bool,
}

#[derive(Debug, Clone)]
pub struct GestureEngine {
    cfg: GestureCfg,
    candidate: Option<Symbol>,
    run: u16,
    confirmed: Option<Symbol>,
    detents: DetentRegister,
    click: Option<u32>,
    long_press: Option<u32>,
}

impl GestureEngine {
    pub fn new(cfg: GestureCfg) -> Self {
        Self {
            cfg,
            candidate: None,
            run: 0,
            confirmed: None,
            detents: DetentRegister::new(),
            click: None,
            long_press: None,
        }
    }

    pub fn config(&self) -> &GestureCfg {
        &self.cfg
    }

    /// Last confirmed state; `None` until the first confirmation.
    pub fn confirmed(&self) -> Option<Symbol> {
        self.confirmed
    }

    /// Current candidate and its run length.
    pub fn candidate(&self) -> Option<(Symbol, u16)> {
        self.candidate.map(|s| (s, self.run))
    }

    /// Ticks since the first release, while a click is pending.
    pub fn click_pending(&self) -> Option<u32> {
        self.click
    }

    /// Ticks the button has been held, while armed.
    pub fn long_press_ticks(&self) -> Option<u32> {
        self.long_press
    }

    pub fn detents(&self) -> DetentRegister {
        self.detents
    }

    /// Forget everything observed so far.
    pub fn reset(&mut self) {
        *self = Self::new(self.cfg.clone());
    }

    /// Feed one classified (non-outlier) symbol.
    pub fn on_symbol<S: EventSink + ?Sized>(&mut self, symbol: Symbol, sink: &mut S) -> Observation {
        let mut obs = Observation::default();

        if let Some(ticks) = self.click {
            let ticks = ticks.saturating_add(1);
            if ticks > self.cfg.single_click_ticks {
                sink.emit(Event::SingleClick);
                self.click = None;
            } else {
                self.click = Some(ticks);
            }
        }

        if self.confirmed == Some(Symbol::ButtonDown) {
            if let Some(ticks) = self.long_press {
                let ticks = ticks.saturating_add(1);
                if ticks > self.cfg.long_press_ticks {
                    tracing::debug!(ticks, "long press");
                    sink.emit(Event::LongPress);
                    self.long_press = None;
                    obs.calibrate = true;
                } else {
                    self.long_press = Some(ticks);
                }
            }
        }

        let Some(next) = self.debounce(symbol) else {
            return obs;
        };
        let prev = self.confirmed.replace(next);
        obs.transition = Some(next);

        if prev == Some(Symbol::ButtonDown) {
            self.long_press = None;
        }

        if prev == Some(Symbol::ButtonDown) && next == Symbol::Idle {
            self.on_release(sink);
        } else {
            match self.detents.push(next) {
                Some(Direction::Forward) => sink.emit(Event::RotateForward),
                Some(Direction::Backward) => sink.emit(Event::RotateBackward),
                None => {}
            }
        }

        if next == Symbol::ButtonDown {
            self.long_press = Some(0);
        }
        obs
    }

    /// Run-length consensus; returns the symbol when it becomes a new
    /// confirmed state.
    fn debounce(&mut self, symbol: Symbol) -> Option<Symbol> {
        if self.candidate != Some(symbol) {
            self.candidate = Some(symbol);
            self.run = 1;
            return None;
        }
        self.run = self.run.saturating_add(1);
        if self.run <= self.cfg.confirm_samples {
            return None;
        }
        self.run = 0;
        (self.confirmed != Some(symbol)).then_some(symbol)
    }

    fn on_release<S: EventSink + ?Sized>(&mut self, sink: &mut S) {
        match self.click {
            None => self.click = Some(0),
            Some(ticks) if ticks <= self.cfg.double_click_ticks => {
                sink.emit(Event::DoubleClick);
                self.click = None;
            }
            Some(_) => {
                // Too late for a double click: the first release stands on
                // its own and this one starts a new pending click.
                sink.emit(Event::SingleClick);
                self.click = Some(0);
            }
        }
    }
}
