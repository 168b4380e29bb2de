//! Shared parameter store and its update protocol.
//!
//! The control surface is the only writer; the streaming stages only read.
//! Every setter stores the raw value, recomputes the coefficients that depend
//! on it, publishes them to their cells, and then tells the observers (the
//! control surface's display widgets) about the accepted value.
//!
//! Setters are serialized by `setter_lock` so that a DC setter reading the
//! other offset field cannot interleave with a concurrent write of that
//! field. The stages never take this lock; they only load atomic cells.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use num_complex::Complex32;
use serde::Serialize;

use super::cell::{AtomicF64, ComplexCell};
use super::parameter::Parameter;
use crate::config::ParameterDefaults;
use crate::dsp::{dc_offset_coefficient, gain_phase_coefficient};

/// Callback invoked with every accepted parameter value
pub type Observer = Box<dyn Fn(Parameter, f64) + Send + Sync>;

/// Point-in-time copy of every parameter and derived coefficient
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterSnapshot {
    pub tone_offset_hz: f64,
    pub sample_rate: f64,
    pub magnitude_correction: f64,
    pub phase_correction: f64,
    pub i_offset: f64,
    pub q_offset: f64,
    pub tuning: f64,
    pub squelch_db: f64,
    /// Gain/phase coefficient as `[re, im]`
    pub gain_phase_coefficient: [f32; 2],
    /// DC offset coefficient as `[re, im]`
    pub dc_offset_coefficient: [f32; 2],
}

pub struct ParameterStore {
    tone_offset_hz: AtomicF64,
    sample_rate: AtomicF64,
    magnitude_correction: AtomicF64,
    phase_correction: AtomicF64,
    i_offset: AtomicF64,
    q_offset: AtomicF64,
    tuning: AtomicF64,
    squelch_db: AtomicF64,

    gain_phase: Arc<ComplexCell>,
    dc_offset: Arc<ComplexCell>,

    setter_lock: Mutex<()>,
    observers: RwLock<Vec<Arc<dyn Fn(Parameter, f64) + Send + Sync>>>,
}

impl ParameterStore {
    pub fn new(defaults: &ParameterDefaults) -> Self {
        Self {
            tone_offset_hz: AtomicF64::new(defaults.tone_offset_hz),
            sample_rate: AtomicF64::new(defaults.sample_rate),
            magnitude_correction: AtomicF64::new(defaults.magnitude_correction),
            phase_correction: AtomicF64::new(defaults.phase_correction),
            i_offset: AtomicF64::new(defaults.i_offset),
            q_offset: AtomicF64::new(defaults.q_offset),
            tuning: AtomicF64::new(defaults.tuning),
            squelch_db: AtomicF64::new(defaults.squelch_db),
            gain_phase: Arc::new(ComplexCell::new(gain_phase_coefficient(
                defaults.magnitude_correction,
            ))),
            dc_offset: Arc::new(ComplexCell::new(dc_offset_coefficient(
                defaults.i_offset,
                defaults.q_offset,
            ))),
            setter_lock: Mutex::new(()),
            observers: RwLock::new(Vec::new()),
        }
    }

    /// Register a display callback. Called after every accepted set.
    ///
    /// Notifications run after the setter lock is released, in the setting
    /// thread. Sets made from one thread are observed in that thread's
    /// order. Sets of the same parameter racing from two threads may be
    /// observed in either order, so the display can lag the stored value
    /// until its next set. Drive each parameter from a single control
    /// surface, or re-read with [`get`](Self::get) when that matters.
    pub fn subscribe(&self, observer: Observer) {
        self.observers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::from(observer));
    }

    fn lock_setters(&self) -> MutexGuard<'_, ()> {
        // The guarded data is (), so a panicked setter leaves nothing inconsistent
        self.setter_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self, parameter: Parameter, value: f64) {
        // Copy the list out so an observer can subscribe or set without deadlocking
        let observers: Vec<_> = self
            .observers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect();
        for observer in observers {
            observer(parameter, value);
        }
    }

    /// Store a value that no coefficient depends on
    fn set_plain(&self, cell: &AtomicF64, parameter: Parameter, value: f64) {
        {
            let _guard = self.lock_setters();
            cell.store(value);
        }
        self.notify(parameter, value);
    }

    pub fn get(&self, parameter: Parameter) -> f64 {
        match parameter {
            Parameter::ToneOffset => self.tone_offset_hz(),
            Parameter::SampleRate => self.sample_rate(),
            Parameter::Magnitude => self.magnitude_correction(),
            Parameter::Phase => self.phase_correction(),
            Parameter::IOffset => self.i_offset(),
            Parameter::QOffset => self.q_offset(),
            Parameter::Tuning => self.tuning(),
            Parameter::Squelch => self.squelch_db(),
        }
    }

    pub fn set(&self, parameter: Parameter, value: f64) {
        match parameter {
            Parameter::ToneOffset => self.set_tone_offset_hz(value),
            Parameter::SampleRate => self.set_sample_rate(value),
            Parameter::Magnitude => self.set_magnitude_correction(value),
            Parameter::Phase => self.set_phase_correction(value),
            Parameter::IOffset => self.set_i_offset(value),
            Parameter::QOffset => self.set_q_offset(value),
            Parameter::Tuning => self.set_tuning(value),
            Parameter::Squelch => self.set_squelch_db(value),
        }
    }

    pub fn tone_offset_hz(&self) -> f64 {
        self.tone_offset_hz.load()
    }

    /// Picked up by the tone source at its next block.
    pub fn set_tone_offset_hz(&self, hz: f64) {
        self.set_plain(&self.tone_offset_hz, Parameter::ToneOffset, hz);
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate.load()
    }

    /// Picked up by the tone source and the sink adapter at their next block.
    ///
    /// Not validated. A non-positive rate is logged and stored anyway.
    pub fn set_sample_rate(&self, rate: f64) {
        if !(rate.is_finite() && rate > 0.0) {
            log::warn!("Sample rate set to {}; downstream output is undefined", rate);
        }
        self.set_plain(&self.sample_rate, Parameter::SampleRate, rate);
    }

    pub fn magnitude_correction(&self) -> f64 {
        self.magnitude_correction.load()
    }

    pub fn set_magnitude_correction(&self, magnitude: f64) {
        {
            let _guard = self.lock_setters();
            self.magnitude_correction.store(magnitude);
            self.gain_phase.store(gain_phase_coefficient(magnitude));
        }
        self.notify(Parameter::Magnitude, magnitude);
    }

    pub fn phase_correction(&self) -> f64 {
        self.phase_correction.load()
    }

    /// Stored and displayed; no coefficient depends on it.
    pub fn set_phase_correction(&self, phase: f64) {
        self.set_plain(&self.phase_correction, Parameter::Phase, phase);
    }

    pub fn i_offset(&self) -> f64 {
        self.i_offset.load()
    }

    pub fn set_i_offset(&self, i_offset: f64) {
        {
            let _guard = self.lock_setters();
            self.i_offset.store(i_offset);
            let q_offset = self.q_offset.load();
            self.dc_offset
                .store(dc_offset_coefficient(i_offset, q_offset));
        }
        self.notify(Parameter::IOffset, i_offset);
    }

    pub fn q_offset(&self) -> f64 {
        self.q_offset.load()
    }

    pub fn set_q_offset(&self, q_offset: f64) {
        {
            let _guard = self.lock_setters();
            self.q_offset.store(q_offset);
            let i_offset = self.i_offset.load();
            self.dc_offset
                .store(dc_offset_coefficient(i_offset, q_offset));
        }
        self.notify(Parameter::QOffset, q_offset);
    }

    pub fn tuning(&self) -> f64 {
        self.tuning.load()
    }

    /// Display only. The device carrier stays where the hardware config put it.
    pub fn set_tuning(&self, hz: f64) {
        self.set_plain(&self.tuning, Parameter::Tuning, hz);
    }

    pub fn squelch_db(&self) -> f64 {
        self.squelch_db.load()
    }

    /// Display only. Nothing gates the stream on this value.
    pub fn set_squelch_db(&self, db: f64) {
        self.set_plain(&self.squelch_db, Parameter::Squelch, db);
    }

    pub fn gain_phase_coefficient(&self) -> Complex32 {
        self.gain_phase.load()
    }

    pub fn dc_offset_coefficient(&self) -> Complex32 {
        self.dc_offset.load()
    }

    /// Cell read by the gain/phase stage
    pub fn gain_phase_cell(&self) -> Arc<ComplexCell> {
        Arc::clone(&self.gain_phase)
    }

    /// Cell read by the DC offset stage
    pub fn dc_offset_cell(&self) -> Arc<ComplexCell> {
        Arc::clone(&self.dc_offset)
    }

    pub fn snapshot(&self) -> ParameterSnapshot {
        let _guard = self.lock_setters();
        let k = self.gain_phase.load();
        let c = self.dc_offset.load();
        ParameterSnapshot {
            tone_offset_hz: self.tone_offset_hz(),
            sample_rate: self.sample_rate(),
            magnitude_correction: self.magnitude_correction(),
            phase_correction: self.phase_correction(),
            i_offset: self.i_offset(),
            q_offset: self.q_offset(),
            tuning: self.tuning(),
            squelch_db: self.squelch_db(),
            gain_phase_coefficient: [k.re, k.im],
            dc_offset_coefficient: [c.re, c.im],
        }
    }
}

impl Default for ParameterStore {
    fn default() -> Self {
        Self::new(&ParameterDefaults::default())
    }
}
