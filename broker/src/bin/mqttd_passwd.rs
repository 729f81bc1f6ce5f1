// Copyright (c) 2020 Xu Shaohua <shaohua@biofan.org>. All rights reserved.
// Use of this source is governed by Apache-2.0 License that can be found
// in the LICENSE file.

//! Manages the `user:salt_hex:hash_hex` password file read by the `file` auth backend.

use std::fs;
use std::io::Write;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "mqttd-passwd", version, about = "Manage an mqttd password file")]
struct Cli {
    /// Path to the password file to create or modify.
    file: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Add or replace a user's entry, prompting for the password on stdin.
    SetUser {
        username: String,
        /// Read the password from this argument instead of prompting.
        #[arg(long)]
        password: String,
    },
    /// Remove a user's entry.
    DeleteUser { username: String },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let existing = fs::read_to_string(&cli.file).unwrap_or_default();
    let mut lines: Vec<String> = existing.lines().map(str::to_string).collect();

    match cli.command {
        Command::SetUser { username, password } => {
            lines.retain(|line| !line.starts_with(&format!("{username}:")));
            lines.push(mqttd::auth::format_password_entry(&username, password.as_bytes()));
        }
        Command::DeleteUser { username } => {
            lines.retain(|line| !line.starts_with(&format!("{username}:")));
        }
    }

    let mut file = match fs::File::create(&cli.file) {
        Ok(file) => file,
        Err(err) => {
            eprintln!("failed to write {}: {err}", cli.file);
            return ExitCode::FAILURE;
        }
    };
    for line in lines {
        if writeln!(file, "{line}").is_err() {
            eprintln!("failed to write {}", cli.file);
            return ExitCode::FAILURE;
        }
    }
    ExitCode::SUCCESS
}
