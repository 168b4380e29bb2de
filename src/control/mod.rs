//! Operator controls.
//!
//! A control surface shows one widget per [`ControlSpec`] and calls the
//! widget's change handler when the operator moves it. The store reports
//! every accepted value back through the surface's display updater, so the
//! widgets mirror the store even when a value is set from elsewhere.

pub mod console;

pub use console::ConsoleSurface;

use std::sync::Arc;

use crate::params::{Observer, Parameter, ParameterStore, ValueKind};

/// Called by a widget with the operator's new value
pub type ChangeHandler = Box<dyn Fn(f64) + Send + Sync>;

/// One operator control
///
/// `min`, `max` and `steps` describe the widget. They are not enforced:
/// values outside the range typed into a text box are passed through.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlSpec {
    pub parameter: Parameter,
    pub label: &'static str,
    pub min: f64,
    pub max: f64,
    pub steps: u32,
    pub kind: ValueKind,
}

impl ControlSpec {
    /// Value change per slider step
    pub fn step(&self) -> f64 {
        (self.max - self.min) / self.steps as f64
    }

    /// Slider position closest to `value`, clamped to the slider range
    pub fn position(&self, value: f64) -> u32 {
        let pos = ((value - self.min) / self.step()).round();
        pos.clamp(0.0, self.steps as f64) as u32
    }

    /// Value at slider position `pos`
    pub fn value_at(&self, pos: u32) -> f64 {
        self.convert(self.min + pos.min(self.steps) as f64 * self.step())
    }

    /// Apply the widget's converter to a raw widget value
    pub fn convert(&self, value: f64) -> f64 {
        match self.kind {
            ValueKind::Integer => value.round(),
            ValueKind::Float => value,
        }
    }
}

/// The operator controls, in display order
pub const CONTROLS: [ControlSpec; 6] = [
    ControlSpec {
        parameter: Parameter::Phase,
        label: "Phase correction",
        min: -0.1,
        max: 0.1,
        steps: 200,
        kind: ValueKind::Float,
    },
    ControlSpec {
        parameter: Parameter::Magnitude,
        label: "Magnitude correction",
        min: -0.1,
        max: 0.1,
        steps: 200,
        kind: ValueKind::Float,
    },
    ControlSpec {
        parameter: Parameter::IOffset,
        label: "DC offset I",
        min: -0.1,
        max: 0.1,
        steps: 200,
        kind: ValueKind::Float,
    },
    ControlSpec {
        parameter: Parameter::QOffset,
        label: "DC offset Q",
        min: -0.1,
        max: 0.1,
        steps: 200,
        kind: ValueKind::Float,
    },
    ControlSpec {
        parameter: Parameter::Tuning,
        label: "LO Tuning",
        min: 300e6,
        max: 3.8e9,
        steps: 200,
        kind: ValueKind::Integer,
    },
    ControlSpec {
        parameter: Parameter::Squelch,
        label: "squelch",
        min: -150.0,
        max: -50.0,
        steps: 100,
        kind: ValueKind::Float,
    },
];

/// Look up the control bound to `parameter`
pub fn control_for(parameter: Parameter) -> Option<&'static ControlSpec> {
    CONTROLS.iter().find(|c| c.parameter == parameter)
}

/// A set of widgets the operator drives
pub trait ControlSurface {
    /// Add a widget showing `value` that calls `on_change` when moved.
    fn register(&mut self, spec: &ControlSpec, value: f64, on_change: ChangeHandler);

    /// Updater the store calls with every accepted value.
    fn display(&self) -> Observer;
}

/// Wire the operator controls to `store`.
///
/// Handlers hold only a weak reference, so the surface does not keep the
/// store alive.
pub fn attach(store: &Arc<ParameterStore>, surface: &mut dyn ControlSurface) {
    for spec in CONTROLS.iter() {
        let weak = Arc::downgrade(store);
        let control = *spec;
        let on_change: ChangeHandler = Box::new(move |value| {
            if let Some(store) = weak.upgrade() {
                store.set(control.parameter, control.convert(value));
            }
        });
        surface.register(spec, store.get(spec.parameter), on_change);
    }
    store.subscribe(surface.display());
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeSurface {
        handlers: HashMap<Parameter, ChangeHandler>,
        initial: HashMap<Parameter, f64>,
        shown: Arc<Mutex<Vec<(Parameter, f64)>>>,
    }

    impl ControlSurface for FakeSurface {
        fn register(&mut self, spec: &ControlSpec, value: f64, on_change: ChangeHandler) {
            self.initial.insert(spec.parameter, value);
            self.handlers.insert(spec.parameter, on_change);
        }

        fn display(&self) -> Observer {
            let shown = Arc::clone(&self.shown);
            Box::new(move |p, v| shown.lock().unwrap().push((p, v)))
        }
    }

    #[test]
    fn test_control_table() {
        assert_eq!(CONTROLS.len(), 6);
        let tuning = control_for(Parameter::Tuning).unwrap();
        assert_eq!(tuning.label, "LO Tuning");
        assert_eq!(tuning.kind, ValueKind::Integer);
        let squelch = control_for(Parameter::Squelch).unwrap();
        assert_eq!(squelch.steps, 100);
        assert!((squelch.step() - 1.0).abs() < 1e-12);
        assert!(control_for(Parameter::SampleRate).is_none());
    }

    #[test]
    fn test_slider_positions() {
        let spec = control_for(Parameter::IOffset).unwrap();
        assert_eq!(spec.position(-0.1), 0);
        assert_eq!(spec.position(0.0), 100);
        assert_eq!(spec.position(0.002), 102);
        assert_eq!(spec.position(5.0), 200);
        assert!((spec.value_at(110) - 0.01).abs() < 1e-12);
    }

    #[test]
    fn test_attach_registers_current_values() {
        let store = Arc::new(ParameterStore::default());
        let mut surface = FakeSurface::default();
        attach(&store, &mut surface);

        assert_eq!(surface.initial.len(), 6);
        assert_eq!(surface.initial[&Parameter::Tuning], 450_000_000.0);
        assert_eq!(surface.initial[&Parameter::Phase], -0.045);
    }

    #[test]
    fn test_widget_change_reaches_store_and_display() {
        let store = Arc::new(ParameterStore::default());
        let mut surface = FakeSurface::default();
        attach(&store, &mut surface);

        (surface.handlers[&Parameter::QOffset])(0.02);
        (surface.handlers[&Parameter::Tuning])(433_920_000.4);

        assert_eq!(store.q_offset(), 0.02);
        assert_eq!(store.tuning(), 433_920_000.0);
        assert_eq!(
            *surface.shown.lock().unwrap(),
            vec![
                (Parameter::QOffset, 0.02),
                (Parameter::Tuning, 433_920_000.0)
            ]
        );
    }

    #[test]
    fn test_store_set_elsewhere_is_mirrored() {
        let store = Arc::new(ParameterStore::default());
        let mut surface = FakeSurface::default();
        attach(&store, &mut surface);

        store.set_squelch_db(-90.0);
        assert_eq!(*surface.shown.lock().unwrap(), vec![(Parameter::Squelch, -90.0)]);
    }

    #[test]
    fn test_out_of_range_passes_through() {
        let store = Arc::new(ParameterStore::default());
        let mut surface = FakeSurface::default();
        attach(&store, &mut surface);
        (surface.handlers[&Parameter::Magnitude])(0.75);
        assert_eq!(store.magnitude_correction(), 0.75);
    }
}
