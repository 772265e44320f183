pub mod hash;
pub mod server;

// The match over actions lives in `run` so this module stays a plain list.
mod run;

#[derive(Debug)]
pub enum Action {
    Server(server::Args),
    HashSecret(hash::Args),
}

impl Action {
    /// Execute the action.
    /// # Errors
    /// Returns an error if the action fails.
    pub async fn execute(self) -> anyhow::Result<()> {
        run::execute(self).await
    }
}
