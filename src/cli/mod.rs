pub mod decommission;
pub mod render;
pub mod scan;

use std::io::{BufRead, Write};

use anyhow::{bail, Context, Result};
use clap::Args;

use org_decommission::client::LoginOutcome;
use org_decommission::session::Credentials;
use org_decommission::{DecomError, Orchestrator};

const MFA_ATTEMPTS: u32 = 3;

/// Operator credentials. Prompted for when not given.
#[derive(Args)]
pub struct LoginArgs {
    /// Admin email
    #[arg(long, env = "ADMIN_EMAIL")]
    email: Option<String>,

    /// Admin password
    #[arg(long, env = "ADMIN_PASSWORD", hide_env_values = true)]
    password: Option<String>,
}

impl LoginArgs {
    fn credentials(&self) -> Result<Credentials> {
        let email = match &self.email {
            Some(email) if !email.trim().is_empty() => email.trim().to_string(),
            _ => prompt("Admin email: ")?,
        };
        let password = match &self.password {
            Some(password) if !password.is_empty() => password.clone(),
            _ => prompt("Admin password: ")?,
        };
        Ok(Credentials::new(email, password))
    }
}

/// Read one trimmed line from stdin after printing `label` to stderr.
pub fn prompt(label: &str) -> Result<String> {
    eprint!("{label}");
    std::io::stderr().flush()?;
    let mut line = String::new();
    let read = std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("reading from stdin")?;
    if read == 0 {
        bail!("input closed");
    }
    Ok(line.trim().to_string())
}

/// Log in, answer a second-factor challenge if one comes, then authorize the
/// run (privilege escalation and ephemeral key).
pub async fn login(orchestrator: &mut Orchestrator, args: &LoginArgs) -> Result<()> {
    let credentials = args.credentials()?;
    let outcome = orchestrator
        .begin_authentication(credentials)
        .await
        .context("login failed")?;

    if let LoginOutcome::MfaRequired { sms_contact } = outcome {
        match sms_contact {
            Some(contact) => eprintln!("org-decommission: code sent to {contact}"),
            None => eprintln!("org-decommission: second factor required"),
        }
        let mut attempt = 1;
        loop {
            let code = prompt("Verification code: ")?;
            match orchestrator.submit_mfa_code(&code).await {
                Ok(()) => break,
                Err(DecomError::MfaRejected { detail }) if attempt < MFA_ATTEMPTS => {
                    eprintln!("org-decommission: code rejected ({detail}), try again");
                    attempt += 1;
                }
                Err(e) => return Err(e).context("second factor failed"),
            }
        }
    }

    let expires_at = orchestrator.authorize().await.map_err(|e| {
        if let DecomError::KeyLimitExceeded { .. } = e {
            eprintln!("org-decommission: revoke unused API keys in the admin console, then retry");
        }
        anyhow::Error::new(e).context("authorization failed")
    })?;
    eprintln!(
        "org-decommission: authorized, api key valid until {}",
        expires_at.format("%H:%M:%S UTC")
    );
    Ok(())
}
