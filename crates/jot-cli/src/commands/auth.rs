use jot_core::{ExitCode, JotError, JotResult};
use serde_json::json;

use crate::{AuthCommand, GlobalOptions, print_json, with_sync_context, yes_no};

const PASSWORD_ENV: &str = "JOT_PASSWORD";

pub(crate) fn cmd_auth(command: AuthCommand, globals: &GlobalOptions) -> JotResult<ExitCode> {
    with_sync_context(globals, |ctx| {
        let api = ctx.sync.api();
        match command {
            AuthCommand::Login { username, remember } => {
                let password = std::env::var(PASSWORD_ENV)
                    .ok()
                    .filter(|password| !password.is_empty())
                    .ok_or_else(|| {
                        JotError::usage(format!("missing password; set {PASSWORD_ENV}"))
                    })?;

                let login = api.login(&username, &password, remember)?;
                let previous_expiration = ctx.state.take_session_expiration();

                if globals.json {
                    print_json(&json!({
                        "ok": true,
                        "result": {
                            "server": ctx.settings.server,
                            "username": username.trim(),
                            "user": login.user,
                            "previous_expiration": previous_expiration,
                        }
                    }))?;
                } else {
                    println!("Signed in to {} as {}", ctx.settings.server, username.trim());
                    println!("Session saved: {}", ctx.paths.state_db_path.display());
                }

                Ok(ExitCode::Success)
            }
            AuthCommand::Status => {
                let expiration = ctx.state.take_session_expiration();

                if api.gate().get_token().is_none() {
                    let reason = expiration
                        .as_ref()
                        .map(|expiration| expiration.message.clone())
                        .unwrap_or_else(|| "no stored token".to_string());
                    if globals.json {
                        print_json(&json!({
                            "ok": false,
                            "result": {
                                "server": ctx.settings.server,
                                "authenticated": false,
                                "reason": reason,
                                "expiration": expiration,
                            }
                        }))?;
                    } else {
                        println!("Server: {}", ctx.settings.server);
                        println!("Authenticated: no");
                        println!("Reason: {reason}");
                    }
                    return Ok(ExitCode::Auth);
                }

                let user = api.current_user()?;
                let last_refresh = api.gate().last_refresh_at();

                if globals.json {
                    print_json(&json!({
                        "ok": true,
                        "result": {
                            "server": ctx.settings.server,
                            "authenticated": true,
                            "user": user,
                            "last_token_refresh": (last_refresh > 0).then_some(last_refresh),
                        }
                    }))?;
                } else {
                    println!("Server: {}", ctx.settings.server);
                    println!("Authenticated: yes");
                    if let Some(username) = user.get("username").and_then(|value| value.as_str()) {
                        println!("User: {username}");
                    }
                }

                Ok(ExitCode::Success)
            }
            AuthCommand::Refresh => {
                let before = api.gate().get_token().ok_or_else(|| {
                    JotError::auth("no active session; run `jot auth login` first")
                })?;

                let token = match api.gate().refresh() {
                    Ok(Some(token)) => token,
                    Ok(None) => {
                        return Err(api.expire_session(
                            Some("AUTH_EXPIRED"),
                            Some("token refresh was rejected; sign in again"),
                        ));
                    }
                    Err(err) if err.is_terminal_auth() => {
                        return Err(api.expire_session(Some("AUTH_EXPIRED"), Some(&err.message)));
                    }
                    Err(err) => return Err(err),
                };
                let rotated = token != before;

                if globals.json {
                    print_json(&json!({
                        "ok": true,
                        "result": {
                            "server": ctx.settings.server,
                            "rotated": rotated,
                            "last_token_refresh": api.gate().last_refresh_at(),
                        }
                    }))?;
                } else {
                    println!("Token rotated: {}", yes_no(rotated));
                }

                Ok(ExitCode::Success)
            }
            AuthCommand::Logout => {
                let (remote_sign_out, warning) = match api.logout() {
                    Ok(()) => (true, None),
                    Err(err) => (false, Some(err.message)),
                };

                if globals.json {
                    print_json(&json!({
                        "ok": true,
                        "result": {
                            "server": ctx.settings.server,
                            "remote_sign_out": remote_sign_out,
                            "warning": warning,
                        }
                    }))?;
                } else {
                    println!("Local session removed.");
                    if let Some(warning) = warning {
                        println!("Server sign-out warning: {warning}");
                    }
                }

                Ok(ExitCode::Success)
            }
        }
    })
}
