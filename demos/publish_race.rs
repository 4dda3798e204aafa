use std::env;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{ensure, Context, Result};
use blockcoord::{
    evaluate_retry_participants_for_signing, retry_seed, BlockCounterService, CoordinationConfig,
    LocalResultChain, MemberIndex, PublishedResult, Publisher,
};
use tokio::task::JoinHandle;

const DEFAULT_MEMBERS: usize = 5;
const DEFAULT_ABSENT: usize = 1;
const DEFAULT_BLOCK_STEP: u64 = 2;
const DEFAULT_TICK_MS: u64 = 200;
const DEFAULT_LOG_DIRECTIVE: &str = "info";
const RESULT: &str = "02a1633cafcc01ebfb6d78e39f687a1f0995c62fc95f51ead10a02ee0be551b5dc";

#[tokio::main]
async fn main() -> Result<()> {
    init_example_tracing();
    let args = DemoArgs::from_env()?;

    let config = CoordinationConfig::builder()
        .tick_interval(Duration::from_millis(args.tick_ms))
        .result_publication_block_step(args.block_step)
        .build()?;
    let service = BlockCounterService::local(&config);
    let chain: Arc<LocalResultChain<String>> =
        Arc::new(LocalResultChain::new(service.counter()));

    println!(
        "{} members racing to publish with a {}-block step; ranks 1..={} are offline",
        args.members, args.block_step, args.absent
    );

    let online = args.absent + 1..=args.members;
    let handles: Vec<(MemberIndex, JoinHandle<Result<PublishedResult<String>>>)> = online
        .map(|publishing_index| {
            let member = publishing_index as MemberIndex;
            let chain = chain.clone();
            let block_step = config.result_publication_block_step();
            let handle = tokio::spawn(async move {
                let publisher = Publisher::new(chain, member, publishing_index, block_step)?;
                Ok(publisher.publish_result(RESULT.to_owned()).await?)
            });
            (member, handle)
        })
        .collect();

    for (member, handle) in handles {
        let published = handle
            .await
            .with_context(|| format!("member {member} task panicked"))??;
        println!(
            "member {member}: accepted result submitted by member {} at block {}",
            published.submitter, published.block_number
        );
    }
    println!("on-chain submissions: {}", chain.submissions().len());

    // A failed signing round would restart with a subset every node derives
    // on its own.
    let members: Vec<MemberIndex> = (1..=args.members as MemberIndex).collect();
    let quorum = args.members / 2 + 1;
    let seed = retry_seed(RESULT.as_bytes());
    for retry_count in 0..3 {
        let subset = evaluate_retry_participants_for_signing(&members, seed, retry_count, quorum)?;
        println!("signing retry {retry_count}: {subset:?}");
    }

    let snapshot = service.telemetry().snapshot();
    println!(
        "blocks observed: {}, submissions: {}, publications observed: {}",
        snapshot.blocks_observed, snapshot.submissions, snapshot.publications_observed
    );
    service.shutdown().await;
    Ok(())
}

fn init_example_tracing() {
    if env::var_os("RUST_LOG").is_none() {
        env::set_var("RUST_LOG", DEFAULT_LOG_DIRECTIVE);
    }
    blockcoord::init_tracing();
}

struct DemoArgs {
    members: usize,
    absent: usize,
    block_step: u64,
    tick_ms: u64,
}

impl DemoArgs {
    fn from_env() -> Result<Self> {
        let members = parse_env_with_default::<usize>("BLOCKCOORD_MEMBERS", DEFAULT_MEMBERS)?;
        let absent = parse_env_with_default::<usize>("BLOCKCOORD_ABSENT", DEFAULT_ABSENT)?;
        let block_step =
            parse_env_with_default::<u64>("BLOCKCOORD_BLOCK_STEP", DEFAULT_BLOCK_STEP)?;
        let tick_ms = parse_env_with_default::<u64>("BLOCKCOORD_TICK_MS", DEFAULT_TICK_MS)?;

        ensure!(members > 0, "BLOCKCOORD_MEMBERS must be greater than 0");
        ensure!(
            absent < members,
            "BLOCKCOORD_ABSENT must leave at least one member online"
        );

        Ok(Self {
            members,
            absent,
            block_step,
            tick_ms,
        })
    }
}

fn parse_env_with_default<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(value) => value
            .parse::<T>()
            .with_context(|| format!("failed to parse {key}='{value}'")),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err).with_context(|| format!("failed to read {key}")),
    }
}
