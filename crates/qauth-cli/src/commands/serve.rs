use std::sync::Arc;

use qauth_core::{CancelToken, SessionKey};

use super::GlobalOpts;

pub fn run(opts: &GlobalOpts, host: &str, port: u16, cancel: CancelToken) {
    let config = super::load_config(opts);
    let session_key = super::or_exit(SessionKey::from_env(), "Cannot start server");
    let service = Arc::new(super::build_service(&config, cancel.clone()));

    let base = format!("http://{host}:{port}");
    println!("QAuth Server v{}", qauth_core::VERSION);
    println!("   {base}");
    println!(
        "   source: {} (guesses are {} digits)",
        service.mode(),
        service.alphabet()
    );
    println!("   secrets: {}", config.store_path.display());
    println!();
    println!("   Endpoints:");
    println!("     GET  /                API index (try: curl {base})");
    println!("     GET  /health          Health check");
    println!("     POST /api/v1/secret   {{\"identity\"}} -> secret and provisioning URI");
    println!("     POST /api/v1/verify   {{\"identity\",\"code\"}} -> session token");
    println!("     POST /api/v1/draw     {{\"guess\"}} + {} header", qauth_server::SESSION_HEADER);
    println!("     POST /api/v1/logout   {} header", qauth_server::SESSION_HEADER);
    println!();

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error starting runtime: {e}");
            std::process::exit(1);
        }
    };
    if let Err(e) = rt.block_on(qauth_server::run_server(
        service,
        session_key.as_bytes(),
        host,
        port,
        cancel,
    )) {
        eprintln!("Server error: {e}");
        std::process::exit(1);
    }
}
