//! Shared fixtures for integration tests
//!
//! [`FakeBw`] is a stateful stand-in for the `bw` CLI: it tracks who is
//! logged in, whether the vault is unlocked and which session token is
//! current, and counts every subcommand it receives.

#![allow(dead_code)]

use async_trait::async_trait;
use enigma::secrets::backends::bitwarden::{CliCommand, CliOutput, CliRunner, SESSION_ENV};
use enigma::Result;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Default)]
struct FakeBwState {
    logged_in_as: Option<String>,
    unlocked: bool,
    token: Option<String>,
    issued: usize,
    items: HashMap<String, String>,
    calls: Vec<String>,
    sync_fails: bool,
}

/// Scripted `bw` CLI
#[derive(Debug)]
pub struct FakeBw {
    email: String,
    password: String,
    state: Mutex<FakeBwState>,
}

impl FakeBw {
    pub fn new(email: &str, password: &str) -> Self {
        Self { email: email.to_string(), password: password.to_string(), state: Mutex::default() }
    }

    /// Register an item returned by `bw get item <name>`.
    pub fn with_item(self, name: &str, item: serde_json::Value) -> Self {
        self.state.lock().unwrap().items.insert(name.to_string(), item.to_string());
        self
    }

    /// Start as already logged in (vault locked), as left by an earlier process.
    pub fn logged_in_locked(self, email: &str) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            state.logged_in_as = Some(email.to_string());
            state.unlocked = false;
            state.token = None;
        }
        self
    }

    /// Lock the vault from outside (e.g. `bw lock` in another shell).
    pub fn lock(&self) {
        let mut state = self.state.lock().unwrap();
        state.unlocked = false;
        state.token = None;
    }

    /// Log another account in from outside.
    pub fn switch_account(&self, email: &str) {
        let mut state = self.state.lock().unwrap();
        state.logged_in_as = Some(email.to_string());
        state.unlocked = true;
        state.issued += 1;
        state.token = Some(format!("foreign-{}", state.issued));
    }

    pub fn fail_sync(&self, fail: bool) {
        self.state.lock().unwrap().sync_fails = fail;
    }

    /// Number of invocations of `subcommand`
    pub fn count(&self, subcommand: &str) -> usize {
        self.state.lock().unwrap().calls.iter().filter(|c| *c == subcommand).count()
    }

    /// Every subcommand received so far, in order
    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn is_logged_in(&self) -> bool {
        self.state.lock().unwrap().logged_in_as.is_some()
    }

    fn check_password(&self, command: &CliCommand) -> bool {
        let Some(position) = command.args.iter().position(|a| a == "--passwordenv") else {
            return false;
        };
        let Some(name) = command.args.get(position + 1) else {
            return false;
        };
        command.env_value(name).is_some_and(|value| value.expose_secret() == self.password)
    }

    fn issue_token(state: &mut FakeBwState) -> String {
        state.issued += 1;
        let token = format!("session-{}", state.issued);
        state.token = Some(token.clone());
        state.unlocked = true;
        token
    }

    fn session_matches(state: &FakeBwState, command: &CliCommand) -> bool {
        match (&state.token, command.env_value(SESSION_ENV)) {
            (Some(token), Some(given)) => token == given.expose_secret(),
            _ => false,
        }
    }
}

#[async_trait]
impl CliRunner for FakeBw {
    async fn run(&self, command: &CliCommand) -> Result<CliOutput> {
        assert!(
            !command.args.iter().any(|a| a == &self.password),
            "master password leaked into argv: {:?}",
            command.args
        );

        let mut state = self.state.lock().unwrap();
        state.calls.push(command.subcommand().to_string());

        let output = match command.subcommand() {
            "status" => {
                let body = match &state.logged_in_as {
                    None => json!({"serverUrl": null, "status": "unauthenticated"}),
                    // the real CLI reports "unlocked" only to a caller holding the live session key
                    Some(email) => json!({
                        "serverUrl": null,
                        "userEmail": email,
                        "status": if state.unlocked && Self::session_matches(&state, command) {
                            "unlocked"
                        } else {
                            "locked"
                        },
                    }),
                };
                CliOutput::ok(body.to_string())
            }
            "login" => {
                if let Some(current) = &state.logged_in_as {
                    CliOutput::failed(format!("You are already logged in as {}.", current))
                } else if command.args.get(1) != Some(&self.email) || !self.check_password(command)
                {
                    CliOutput::failed("Username or password is incorrect. Try again.")
                } else {
                    state.logged_in_as = Some(self.email.clone());
                    CliOutput::ok(Self::issue_token(&mut state))
                }
            }
            "unlock" => {
                if state.logged_in_as.is_none() {
                    CliOutput::failed("You are not logged in.")
                } else if !self.check_password(command) {
                    CliOutput::failed("Invalid master password.")
                } else {
                    CliOutput::ok(Self::issue_token(&mut state))
                }
            }
            "logout" => {
                if state.logged_in_as.take().is_none() {
                    CliOutput::failed("You are not logged in.")
                } else {
                    state.unlocked = false;
                    state.token = None;
                    CliOutput::ok("You have logged out.")
                }
            }
            "sync" => {
                if state.sync_fails {
                    CliOutput::failed("Sync failed: network unreachable")
                } else if Self::session_matches(&state, command) {
                    CliOutput::ok("Syncing complete.")
                } else {
                    CliOutput::failed("Vault is locked.")
                }
            }
            "get" => {
                if state.logged_in_as.is_none() {
                    CliOutput::failed("You are not logged in.")
                } else if !state.unlocked || !Self::session_matches(&state, command) {
                    CliOutput::failed("Vault is locked.")
                } else {
                    let name = command.args.get(2).cloned().unwrap_or_default();
                    match state.items.get(&name) {
                        Some(item) => CliOutput::ok(item.clone()),
                        None => CliOutput::failed("Not found."),
                    }
                }
            }
            other => CliOutput::failed(format!("Unknown command: {}", other)),
        };

        Ok(output)
    }
}

/// The item used by the Bitwarden scenarios
pub fn github_item() -> serde_json::Value {
    json!({
        "object": "item",
        "id": "0c5f9b3e",
        "name": "github",
        "login": {"username": "u", "password": null, "totp": null},
        "notes": null,
        "fields": [
            {"name": "api_token", "value": "t", "type": 1},
            {"name": "recovery", "value": "r", "type": 1}
        ]
    })
}
