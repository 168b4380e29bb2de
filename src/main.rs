use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;

use iqtrim::config::Frequency;
use iqtrim::control::{self, ConsoleSurface};
use iqtrim::device::SinkAdapter;
use iqtrim::{AppConfig, Pipeline, ParameterStore};

#[derive(Parser, Debug)]
#[command(name = "iqtrim")]
#[command(about = "Transmit a test tone with live I/Q impairment pre-correction", long_about = None)]
struct Args {
    /// TOML configuration file
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Device arguments, e.g. "numchan=1 file=tx.wav" or "soapy=0,driver=hackrf"
    #[arg(short = 'd', long)]
    device_args: Option<String>,

    /// Device channel
    #[arg(long)]
    channel: Option<usize>,

    /// Transmit carrier frequency (e.g. 441M)
    #[arg(short = 'f', long)]
    center_freq: Option<Frequency>,

    /// Frequency correction in ppm
    #[arg(long, allow_hyphen_values = true)]
    ppm: Option<f64>,

    /// RF gain in dB
    #[arg(long)]
    rf_gain: Option<f64>,

    /// IF gain in dB
    #[arg(long)]
    if_gain: Option<f64>,

    /// Baseband gain in dB
    #[arg(long)]
    bb_gain: Option<f64>,

    /// Antenna name
    #[arg(long)]
    antenna: Option<String>,

    /// Analog bandwidth (0 = automatic)
    #[arg(long)]
    bandwidth: Option<Frequency>,

    /// Sample rate (e.g. 20M)
    #[arg(short = 'r', long)]
    sample_rate: Option<Frequency>,

    /// Tone offset from the carrier (e.g. 100k)
    #[arg(short = 't', long, allow_hyphen_values = true)]
    tone: Option<Frequency>,

    /// Initial magnitude correction
    #[arg(long, allow_hyphen_values = true)]
    magnitude: Option<f64>,

    /// Initial phase correction
    #[arg(long, allow_hyphen_values = true)]
    phase: Option<f64>,

    /// Initial DC offset, I
    #[arg(long, allow_hyphen_values = true)]
    i_offset: Option<f64>,

    /// Initial DC offset, Q
    #[arg(long, allow_hyphen_values = true)]
    q_offset: Option<f64>,

    /// Initial LO tuning display value
    #[arg(long)]
    tuning: Option<Frequency>,

    /// Initial squelch display value in dB
    #[arg(long, allow_hyphen_values = true)]
    squelch: Option<f64>,

    /// Samples per block
    #[arg(long)]
    block_size: Option<usize>,

    /// Stop after this many seconds of samples
    #[arg(long)]
    duration: Option<f64>,

    /// Do not read commands from stdin
    #[arg(long)]
    no_console: bool,

    /// Verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Args {
    fn apply(&self, config: &mut AppConfig) {
        let hw = &mut config.hardware;
        if let Some(ref device_args) = self.device_args {
            hw.device_args = device_args.clone();
        }
        if let Some(channel) = self.channel {
            hw.channel = channel;
        }
        if let Some(f) = self.center_freq {
            hw.center_frequency = f.as_hz();
        }
        if let Some(ppm) = self.ppm {
            hw.frequency_correction_ppm = ppm;
        }
        if let Some(gain) = self.rf_gain {
            hw.rf_gain = gain;
        }
        if let Some(gain) = self.if_gain {
            hw.if_gain = gain;
        }
        if let Some(gain) = self.bb_gain {
            hw.baseband_gain = gain;
        }
        if let Some(ref antenna) = self.antenna {
            hw.antenna = antenna.clone();
        }
        if let Some(bw) = self.bandwidth {
            hw.bandwidth = bw.as_hz();
        }

        let p = &mut config.parameters;
        if let Some(rate) = self.sample_rate {
            p.sample_rate = rate.as_hz().round();
        }
        if let Some(tone) = self.tone {
            p.tone_offset_hz = tone.as_hz();
        }
        if let Some(m) = self.magnitude {
            p.magnitude_correction = m;
        }
        if let Some(phase) = self.phase {
            p.phase_correction = phase;
        }
        if let Some(i) = self.i_offset {
            p.i_offset = i;
        }
        if let Some(q) = self.q_offset {
            p.q_offset = q;
        }
        if let Some(tuning) = self.tuning {
            p.tuning = tuning.as_hz().round();
        }
        if let Some(squelch) = self.squelch {
            p.squelch_db = squelch;
        }

        if let Some(block_size) = self.block_size {
            config.pipeline.block_size = block_size;
        }
        if let Some(secs) = self.duration {
            config.pipeline.max_samples = Some((secs * config.parameters.sample_rate).round() as u64);
        }
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let log_level = match args.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    let mut config = match args.config {
        Some(ref path) => AppConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => AppConfig::default(),
    };
    args.apply(&mut config);
    config.pipeline.validate()?;

    println!("=== iqtrim - I/Q Impairment Pre-Correction ===");
    println!("Device: {}", config.hardware.device_args);
    println!(
        "Carrier: {} Hz (channel {})",
        config.hardware.center_frequency, config.hardware.channel
    );
    println!(
        "Gains RF/IF/BB: {}/{}/{} dB",
        config.hardware.rf_gain, config.hardware.if_gain, config.hardware.baseband_gain
    );
    println!("Sample rate: {} sps", config.parameters.sample_rate);
    println!("Tone offset: {} Hz", config.parameters.tone_offset_hz);
    println!(
        "DC offset: {:+} {:+}i, magnitude {}, phase {}",
        config.parameters.i_offset,
        config.parameters.q_offset,
        config.parameters.magnitude_correction,
        config.parameters.phase_correction
    );
    if let Some(n) = config.pipeline.max_samples {
        println!("Stopping after {} samples", n);
    }
    println!();

    let params = Arc::new(ParameterStore::new(&config.parameters));

    let sink = SinkAdapter::open(&config.hardware, Arc::clone(&params))
        .context("Failed to set up transmit device")?;

    let pipeline = Pipeline::start(Arc::clone(&params), sink, &config.pipeline)
        .context("Failed to start pipeline")?;

    println!("Transmitting...");

    if args.no_console {
        while !pipeline.is_finished() {
            thread::sleep(Duration::from_millis(100));
        }
    } else {
        run_console(&params, &pipeline)?;
    }

    let sent = pipeline.samples_sent();
    let result = pipeline.stop();
    println!("Sent {} samples", sent);
    result.context("Transmit pipeline failed")?;

    Ok(())
}

fn run_console(params: &Arc<ParameterStore>, pipeline: &Pipeline) -> anyhow::Result<()> {
    let mut surface = ConsoleSurface::new(Arc::clone(params));
    control::attach(params, &mut surface);

    println!("Type \"help\" for commands.");

    let (done_tx, done_rx) = crossbeam_channel::bounded::<iqtrim::Result<()>>(1);
    thread::Builder::new()
        .name("console".into())
        .spawn(move || {
            let stdin = std::io::stdin();
            let mut stdout = std::io::stdout();
            let result = surface.run(stdin.lock(), &mut stdout);
            let _ = done_tx.send(result);
        })
        .context("Failed to start console")?;

    loop {
        if pipeline.is_finished() {
            println!();
            return Ok(());
        }
        match done_rx.recv_timeout(Duration::from_millis(100)) {
            Ok(result) => return result.context("Console failed"),
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {}
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => return Ok(()),
        }
    }
}

