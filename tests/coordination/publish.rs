use std::sync::Arc;
use std::time::Duration;

use crate::support::helpers::{
    init_tracing, local_config, run_race, within, Contender, BLOCK_STEP, START_HEIGHT,
};
use anyhow::Result;
use blockcoord::{BlockCounter, BlockCounterService, LocalResultChain, Publisher};
use tokio::time::timeout;

fn local_chain(service: &BlockCounterService) -> Arc<LocalResultChain<String>> {
    Arc::new(LocalResultChain::new(service.counter()))
}

#[tokio::test(start_paused = true)]
async fn lone_member_submits_when_its_window_opens() -> Result<()> {
    init_tracing();
    for index in [1usize, 2, 4] {
        let service = BlockCounterService::local(&local_config()?);
        let chain = local_chain(&service);

        let outcomes = run_race(
            &service,
            chain.clone(),
            vec![Contender::new(7, index, "group-key")],
            BLOCK_STEP,
        )
        .await?;

        let expected = START_HEIGHT + (index as u64 - 1) * BLOCK_STEP;
        let (published, returned_at) = &outcomes[0];
        assert_eq!(published.submitter, 7);
        assert_eq!(published.block_number, expected, "publishing index {index}");
        assert_eq!(*returned_at, expected);
        assert_eq!(chain.submissions().len(), 1);
        assert_eq!(service.telemetry().snapshot().submissions, 1);

        service.shutdown().await;
    }
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn later_member_adopts_earlier_publication() -> Result<()> {
    init_tracing();
    let service = BlockCounterService::local(&local_config()?);
    let chain = local_chain(&service);

    let outcomes = run_race(
        &service,
        chain.clone(),
        vec![
            Contender::new(1, 1, "group-key"),
            Contender::new(4, 4, "group-key"),
        ],
        BLOCK_STEP,
    )
    .await?;

    assert_eq!(outcomes[0].0, outcomes[1].0);
    assert_eq!(outcomes[0].0.submitter, 1);
    assert_eq!(outcomes[0].0.block_number, START_HEIGHT);
    assert_eq!(outcomes[1].1, START_HEIGHT);
    assert_eq!(chain.submissions().len(), 1);
    // Member 4 was already waiting, so it learnt about the submission from
    // the publication stream.
    assert_eq!(service.telemetry().snapshot().publications_observed, 1);

    service.shutdown().await;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn every_ranked_member_converges_on_one_submission() -> Result<()> {
    init_tracing();
    let service = BlockCounterService::local(&local_config()?);
    let chain = local_chain(&service);

    let contenders = (1..=5)
        .map(|index| Contender::new(index as u32 * 10, index, "signature"))
        .collect();
    let outcomes = run_race(&service, chain.clone(), contenders, BLOCK_STEP).await?;

    let submissions = chain.submissions();
    assert_eq!(submissions.len(), 1);
    for (published, _) in &outcomes {
        assert_eq!(published, &submissions[0]);
    }
    let snapshot = service.telemetry().snapshot();
    assert_eq!(snapshot.submissions, 1);
    assert_eq!(snapshot.publications_observed, 4);

    service.shutdown().await;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn absent_first_member_hands_over_to_second_window() -> Result<()> {
    init_tracing();
    let service = BlockCounterService::local(&local_config()?);
    let chain = local_chain(&service);

    let outcomes = run_race(
        &service,
        chain.clone(),
        vec![
            Contender::new(2, 2, "group-key"),
            Contender::new(3, 3, "group-key"),
        ],
        BLOCK_STEP,
    )
    .await?;

    let second_window = START_HEIGHT + BLOCK_STEP;
    assert_eq!(outcomes[0].0.submitter, 2);
    assert_eq!(outcomes[0].0.block_number, second_window);
    assert_eq!(outcomes[1].0, outcomes[0].0);
    assert_eq!(outcomes[1].1, second_window);
    assert_eq!(chain.submissions().len(), 1);
    assert_eq!(service.telemetry().snapshot().publications_observed, 1);

    service.shutdown().await;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn divergent_result_does_not_stop_own_submission() -> Result<()> {
    init_tracing();
    let service = BlockCounterService::local(&local_config()?);
    let chain = local_chain(&service);

    let outcomes = run_race(
        &service,
        chain.clone(),
        vec![
            Contender::new(1, 1, "key-a"),
            Contender::new(4, 4, "key-b"),
        ],
        BLOCK_STEP,
    )
    .await?;

    assert_eq!(outcomes[0].0.result, "key-a");
    assert_eq!(outcomes[0].0.block_number, START_HEIGHT);
    assert_eq!(outcomes[1].0.result, "key-b");
    assert_eq!(outcomes[1].0.submitter, 4);
    assert_eq!(outcomes[1].0.block_number, START_HEIGHT + 3 * BLOCK_STEP);
    assert_eq!(outcomes[1].1, START_HEIGHT + 3 * BLOCK_STEP);
    assert_eq!(chain.submissions().len(), 2);
    let snapshot = service.telemetry().snapshot();
    assert_eq!(snapshot.publications_observed, 1);
    assert_eq!(snapshot.submissions, 2);

    service.shutdown().await;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn caller_supplies_the_deadline() -> Result<()> {
    init_tracing();
    // Nothing drives this counter, so the window never opens.
    let chain = Arc::new(LocalResultChain::<String>::new(BlockCounter::new(
        START_HEIGHT,
    )));
    let publisher = Publisher::new(chain.clone(), 2, 2, BLOCK_STEP)?;

    let outcome = timeout(
        Duration::from_secs(30),
        publisher.publish_result("group-key".to_owned()),
    )
    .await;
    assert!(outcome.is_err(), "publisher should still be waiting");
    assert!(chain.submissions().is_empty());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn submission_rejection_reaches_the_caller() -> Result<()> {
    init_tracing();
    let service = BlockCounterService::local(&local_config()?);
    let chain = local_chain(&service);
    chain.set_submission_failure(Some("gas price too low"));

    let publisher = Publisher::new(chain.clone(), 1, 2, BLOCK_STEP)?;
    let err = within(
        Duration::from_secs(30),
        publisher.publish_result("group-key".to_owned()),
    )
        .await?
        .unwrap_err();
    assert_eq!(err.to_string(), "submission rejected: gas price too low");
    assert_eq!(service.counter().current_block(), START_HEIGHT + BLOCK_STEP);

    service.shutdown().await;
    Ok(())
}
