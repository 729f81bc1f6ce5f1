// Copyright (c) 2020 Xu Shaohua <shaohua@biofan.org>. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use log::error;

use mqttd::cli::Cli;
use mqttd::config::Config;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match Config::load(&cli) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::from(2);
        }
    };

    if let Err(err) = mqttd::log::init(&config.log) {
        eprintln!("failed to initialize logging: {err}");
        return ExitCode::from(2);
    }

    let authenticator = match mqttd::auth::build(
        config.security.auth_service_factory(),
        config.security.allow_anonymous(),
        config.security.password_file(),
    ) {
        Ok(authenticator) => Arc::from(authenticator),
        Err(err) => {
            error!("{err}");
            return ExitCode::from(2);
        }
    };

    if let Err(err) = mqttd::server::run(Arc::new(config), authenticator).await {
        error!("{err}");
        return ExitCode::from(2);
    }

    ExitCode::SUCCESS
}
