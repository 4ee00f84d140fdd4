pub mod run;
pub mod validate;

use super::args::{Cli, Command, JudgeArgs, JudgeBackend};
use anyhow::Context;
use std::sync::Arc;
use tribunal_core::providers::fake::FakeProvider;
use tribunal_core::providers::openai::OpenAIProvider;
use tribunal_core::providers::JudgeProvider;

pub async fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    match cli.cmd {
        Command::Run(args) => run::run(args).await,
        Command::Validate(args) => validate::run(args),
    }
}

pub(crate) fn build_provider(args: &JudgeArgs) -> anyhow::Result<Arc<dyn JudgeProvider>> {
    match args.judge {
        JudgeBackend::Fake => Ok(Arc::new(FakeProvider::new(args.fake_response.clone()))),
        JudgeBackend::Openai => {
            let key = args
                .openai_api_key
                .clone()
                .filter(|k| !k.trim().is_empty())
                .context("--judge openai needs OPENAI_API_KEY (or --openai-api-key)")?;
            let mut provider = OpenAIProvider::new(key);
            if let Some(url) = &args.openai_base_url {
                provider = provider.with_base_url(url.clone());
            }
            if let Some(model) = &args.judge_model {
                provider = provider.with_default_model(model.clone());
            }
            Ok(Arc::new(provider))
        }
    }
}
