use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::info;
use medhome_core::connectivity::establish;
use medhome_core::sim::{ScriptedButton, SimulatedLink};
use medhome_core::{
    Clock, CycleOutcome, LogSink, StartButton, StatusChannel, SystemClock, WorkflowController,
    WorkflowState,
};

use super::TerminalDisplay;
use crate::{EndpointArgs, SimArgs};

/// Polls the button is held for, and released between presses.
const PRESS_POLLS: usize = 10;

pub fn run(
    config: Option<&Path>,
    endpoint: &EndpointArgs,
    sim: &SimArgs,
    cycles: usize,
    offline: bool,
) {
    let profile = super::load_profile(config, endpoint);
    let clock = SystemClock;

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    }) {
        eprintln!("Error setting Ctrl+C handler: {e}");
        std::process::exit(1);
    }

    println!("MedHome station v{}", medhome_core::VERSION);
    println!("  Serial:    {}", profile.serial);
    println!("  Endpoint:  {}", profile.endpoint.url());
    println!("  Schema:    {}", profile.endpoint.schema);
    println!(
        "  Retries:   {} attempts, on exhaustion: {:?}",
        profile.retry.max_attempts, profile.retry.on_exhaustion
    );
    if cycles == 0 {
        println!("  Cycles:    until Ctrl+C");
    } else {
        println!("  Cycles:    {cycles}");
    }
    println!();

    let mut status = StatusChannel::new()
        .with(LogSink)
        .with(TerminalDisplay::new(&profile));

    let online = if offline {
        status.publish(WorkflowState::Idle, "Running offline");
        false
    } else {
        let mut link = SimulatedLink::new(2);
        establish(&mut link, &profile.connectivity, &clock, &mut status).is_online()
    };

    let session = super::simulated_session(&profile, sim);
    info!("sensors: {}", session.sensor_names().join(", "));
    let sink = super::make_sink(&profile, online);
    let poll = profile.timing.poll;
    let mut station = WorkflowController::new(session, &profile, sink, status, clock);

    let mut button = ScriptedButton::presses(1, PRESS_POLLS, PRESS_POLLS);
    let (mut completed, mut delivered) = (0usize, 0usize);

    while running.load(Ordering::SeqCst) && (cycles == 0 || completed < cycles) {
        if button.remaining() == 0 {
            button = ScriptedButton::presses(1, PRESS_POLLS, PRESS_POLLS);
        }
        if let Some(report) = station.poll(button.is_pressed()) {
            completed += 1;
            if report.delivered() {
                delivered += 1;
            }
            if report.outcome == CycleOutcome::Halted {
                break;
            }
        }
        station.clock().sleep(poll);
    }

    println!();
    println!(
        "{completed} cycle(s), {delivered} delivered, {} unsent",
        station.unsent().len()
    );
    if station.state() == WorkflowState::Fault {
        eprintln!("Station halted in fault state; restart required.");
        std::process::exit(1);
    }
}
