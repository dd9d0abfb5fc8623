pub fn run(host: &str, port: u16) {
    let base = format!("http://{host}:{port}");

    println!("MedHome Collection Server v{}", medhome_core::VERSION);
    println!("   {base}");
    println!();
    println!("   Endpoints:");
    println!("     GET  /                            API index (try: curl {base})");
    println!("     GET  /hello                       Liveness greeting");
    println!("     GET  /health                      Stored record counts");
    println!("     POST /api/v1/telemetry            Submit a reading (schema v1)");
    println!("     POST /avgHRavgSpO2weightbpSbpD    Submit a reading (legacy schema)");
    println!("     GET  /devices/<serial>/readings   Stored readings");
    println!("     GET  /devices/<serial>/analysis   Weekly trend analysis");
    println!();
    println!("   Point a station at it:");
    println!("     medhome measure --endpoint {base} --schema v1");
    println!();

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error starting runtime: {e}");
            std::process::exit(1);
        }
    };
    if let Err(e) = rt.block_on(medhome_server::run_server(host, port)) {
        eprintln!("Server error: {e}");
        std::process::exit(1);
    }
}
