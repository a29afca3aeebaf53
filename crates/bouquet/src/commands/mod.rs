use async_trait::async_trait;
use eyre::Result;

pub mod catalog;
pub mod export;
pub mod run;

#[async_trait]
pub trait Command {
    async fn execute(&self) -> Result<()>;
}
