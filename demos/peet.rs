//! Fetch tls.peet.ws and print what the server saw.
//!
//! ```sh
//! RUST_LOG=impersonet=debug cargo run --example peet -- chrome_131 macos
//! ```

use impersonet::{list_profiles, Client, ImpersonateOs};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut args = std::env::args().skip(1);
    let profile = args.next().unwrap_or_else(|| "chrome_120".to_string());
    let os: Option<ImpersonateOs> = args.next().map(|s| s.parse()).transpose()?;

    if profile == "list" {
        for id in list_profiles() {
            println!("{}", id);
        }
        return Ok(());
    }

    let mut builder = Client::builder().impersonate(&profile);
    if let Some(os) = os {
        builder = builder.impersonate_os(os);
    }
    let client = builder.build()?;
    let emulation = client.emulation();
    println!("Profile:  {} ({})", emulation.profile_id, emulation.os);
    println!("Akamai:   {}", emulation.http2_options.akamai());

    let response = client.get("https://tls.peet.ws/api/all").send().await?;
    println!("Status:   {} over {:?}", response.status_code(), response.version());

    let report = response.json().await?;
    println!("JA3:      {}", report["tls"]["ja3_hash"]);
    println!("JA4:      {}", report["tls"]["ja4"]);
    println!("Peetprint {}", report["tls"]["peetprint_hash"]);
    println!("H2:       {}", report["http2"]["akamai_fingerprint"]);
    println!("UA:       {}", report["user_agent"]);
    Ok(())
}
