use std::path::PathBuf;

#[tokio::main]
async fn main() {
    let config_path = std::env::args().nth(1).map(PathBuf::from);

    let result = match liquid_send_lib::run(config_path.as_deref()).await {
        Ok(report) => liquid_send_lib::report_json(&report),
        Err(e) => Err(e),
    };

    match result {
        Ok(json) => println!("{json}"),
        Err(e) => {
            log::error!("{e}");
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    }
}
