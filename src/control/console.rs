use std::collections::BTreeMap;
use std::io::{BufRead, Write};
use std::sync::{Arc, Mutex, PoisonError};

use super::{ChangeHandler, ControlSpec, ControlSurface};
use crate::error::{Result, TxError};
use crate::params::{Observer, Parameter, ParameterStore};

/// Whether the console keeps reading after a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Line-oriented control surface
///
/// Commands:
/// - `set <name> <value>` or `<name>=<value>`
/// - `get <name>`
/// - `list` shows the controls and their mirrored values
/// - `dump` prints every parameter and coefficient as JSON
/// - `help`, `quit`
///
/// Controls are driven through their change handlers like a slider would be.
/// Parameters without a control (tone offset, sample rate) go straight to
/// the store.
pub struct ConsoleSurface {
    store: Arc<ParameterStore>,
    controls: Vec<(ControlSpec, ChangeHandler)>,
    mirror: Arc<Mutex<BTreeMap<Parameter, f64>>>,
}

impl ConsoleSurface {
    pub fn new(store: Arc<ParameterStore>) -> Self {
        Self {
            store,
            controls: Vec::new(),
            mirror: Arc::new(Mutex::new(BTreeMap::new())),
        }
    }

    /// Value last reported for a control
    pub fn shown(&self, parameter: Parameter) -> Option<f64> {
        self.mirror
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&parameter)
            .copied()
    }

    /// Read commands until `quit` or end of input.
    pub fn run<R: BufRead, W: Write>(&self, input: R, output: &mut W) -> Result<()> {
        write!(output, "> ")?;
        output.flush()?;
        for line in input.lines() {
            let line = line?;
            if self.execute(&line, output)? == Flow::Quit {
                break;
            }
            write!(output, "> ")?;
            output.flush()?;
        }
        Ok(())
    }

    /// Run one command line. Operator mistakes are reported on `output`;
    /// only I/O errors are returned.
    pub fn execute<W: Write>(&self, line: &str, output: &mut W) -> Result<Flow> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(Flow::Continue);
        }

        let result = match self.dispatch(line, output) {
            Err(TxError::Io(e)) => return Err(TxError::Io(e)),
            other => other,
        };
        match result {
            Ok(flow) => Ok(flow),
            Err(e) => {
                writeln!(output, "error: {}", e)?;
                Ok(Flow::Continue)
            }
        }
    }

    fn dispatch<W: Write>(&self, line: &str, output: &mut W) -> Result<Flow> {
        if let Some((name, value)) = line.split_once('=') {
            self.set(name, value, output)?;
            return Ok(Flow::Continue);
        }

        let mut words = line.split_whitespace();
        let command = words.next().unwrap_or_default();
        let args: Vec<&str> = words.collect();

        match (command, args.as_slice()) {
            ("set", [name, value]) => self.set(name, value, output)?,
            ("get", [name]) => {
                let parameter: Parameter = name.parse()?;
                let value = self
                    .shown(parameter)
                    .unwrap_or_else(|| self.store.get(parameter));
                writeln!(output, "{} = {}", parameter, parameter.format_value(value))?;
            }
            ("list", []) => self.list(output)?,
            ("dump", []) => {
                let json = serde_json::to_string_pretty(&self.store.snapshot())
                    .map_err(|e| TxError::Pipeline(format!("snapshot: {}", e)))?;
                writeln!(output, "{}", json)?;
            }
            ("help", []) | ("?", []) => Self::help(output)?,
            ("quit", []) | ("exit", []) | ("q", []) => return Ok(Flow::Quit),
            _ => writeln!(output, "unknown command: {:?} (try \"help\")", line)?,
        }
        Ok(Flow::Continue)
    }

    fn set<W: Write>(&self, name: &str, text: &str, output: &mut W) -> Result<()> {
        let parameter: Parameter = name.parse()?;
        let value = parameter.parse_value(text)?;

        match self.controls.iter().find(|(spec, _)| spec.parameter == parameter) {
            Some((spec, on_change)) => {
                if value < spec.min || value > spec.max {
                    log::info!(
                        "{} = {} is outside the slider range [{}, {}]",
                        spec.label,
                        value,
                        spec.min,
                        spec.max
                    );
                }
                on_change(value);
            }
            None => self.store.set(parameter, value),
        }
        writeln!(output, "{} = {}", parameter, parameter.format_value(self.store.get(parameter)))?;
        Ok(())
    }

    fn list<W: Write>(&self, output: &mut W) -> Result<()> {
        for (spec, _) in &self.controls {
            let value = self.shown(spec.parameter).unwrap_or(f64::NAN);
            writeln!(
                output,
                "{:<22} {:<10} {:>14}   [{} .. {}, {} steps]",
                spec.label,
                spec.parameter.name(),
                spec.parameter.format_value(value),
                spec.min,
                spec.max,
                spec.steps
            )?;
        }
        for parameter in [Parameter::ToneOffset, Parameter::SampleRate] {
            writeln!(
                output,
                "{:<22} {:<10} {:>14}",
                "",
                parameter.name(),
                parameter.format_value(self.store.get(parameter))
            )?;
        }
        Ok(())
    }

    fn help<W: Write>(output: &mut W) -> Result<()> {
        writeln!(output, "set <name> <value> | <name>=<value>   change a parameter")?;
        writeln!(output, "get <name>                            show a parameter")?;
        writeln!(output, "list                                  show all controls")?;
        writeln!(output, "dump                                  parameters as JSON")?;
        writeln!(output, "quit                                  stop transmitting")?;
        writeln!(
            output,
            "names: {}",
            Parameter::ALL.map(|p| p.name()).join(", ")
        )?;
        Ok(())
    }
}

impl ControlSurface for ConsoleSurface {
    fn register(&mut self, spec: &ControlSpec, value: f64, on_change: ChangeHandler) {
        self.mirror
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(spec.parameter, value);
        self.controls.push((*spec, on_change));
    }

    fn display(&self) -> Observer {
        let mirror = Arc::clone(&self.mirror);
        Box::new(move |parameter, value| {
            log::debug!("{} -> {}", parameter, value);
            mirror
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(parameter, value);
        })
    }
}
