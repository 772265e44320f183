use crate::gateway::secret::hash_secret;
use anyhow::Result;
use secrecy::{ExposeSecret, SecretString};

#[derive(Debug)]
pub struct Args {
    pub secret: SecretString,
}

/// Print the Argon2 PHC string for a users file entry.
/// # Errors
/// Returns an error if hashing fails.
pub fn execute(args: &Args) -> Result<()> {
    let hash = hash_secret(args.secret.expose_secret())?;
    println!("{hash}");
    Ok(())
}
