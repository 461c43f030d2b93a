use slack_archive::SchedulerOutcome;
use std::process::ExitCode;

#[rocket::main]
async fn main() -> ExitCode {
    let rocket = slack_archive::rocket();
    log::info!("starting slack archive server");

    let rocket = match rocket.launch().await {
        Ok(rocket) => rocket,
        Err(err) => {
            log::error!("server failed: {}", err);
            return ExitCode::FAILURE;
        }
    };

    match rocket.state::<SchedulerOutcome>().and_then(|outcome| outcome.failure()) {
        Some(reason) => {
            log::error!("exiting after fatal ingestion error: {}", reason);
            ExitCode::FAILURE
        }
        None => ExitCode::SUCCESS,
    }
}
