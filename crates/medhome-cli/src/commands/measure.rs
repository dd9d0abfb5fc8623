use std::path::Path;

use log::info;
use medhome_core::{CycleOutcome, LogSink, StatusChannel, SystemClock, WorkflowController};

use super::{PrintSink, TerminalDisplay};
use crate::{EndpointArgs, SimArgs};

pub fn run(config: Option<&Path>, endpoint: &EndpointArgs, sim: &SimArgs, dry_run: bool) {
    let profile = super::load_profile(config, endpoint);

    let session = super::simulated_session(&profile, sim);
    info!("sensors: {}", session.sensor_names().join(", "));
    let sink: Box<dyn medhome_core::TelemetrySink> = if dry_run {
        Box::new(PrintSink::new(&profile))
    } else {
        super::make_sink(&profile, true)
    };
    let status = StatusChannel::new()
        .with(LogSink)
        .with(TerminalDisplay::new(&profile));
    let mut station = WorkflowController::new(session, &profile, sink, status, SystemClock);

    let Some(report) = station.run_cycle() else {
        eprintln!("Station is not idle");
        std::process::exit(1);
    };

    let r = &report.record;
    println!();
    println!("Record {}", r.id());
    println!("  Heart rate:     {} BPM", r.heart_rate());
    println!("  SpO2:           {} %", r.spo2());
    println!("  Vitals valid:   {}", r.vitals_valid());
    println!("  Weight:         {:.2}", r.weight());
    println!("  Blood pressure: {} / {}", r.systolic(), r.diastolic());

    match report.outcome {
        CycleOutcome::Delivered { attempts } => {
            println!("  Delivered on attempt {attempts}/{}", profile.retry.max_attempts)
        }
        CycleOutcome::Queued => {
            eprintln!("Delivery failed; record kept in the unsent queue");
            std::process::exit(1);
        }
        CycleOutcome::Halted => {
            eprintln!("Delivery failed after {} attempts", profile.retry.max_attempts);
            std::process::exit(1);
        }
    }
}
