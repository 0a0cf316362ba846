use sd_task_builder::{
	ExclusionRule, LocalScheduler, Outcome, SchedulerConfig, TaskSpec, TaskStatus,
};

use std::{
	num::NonZeroUsize,
	sync::{Arc, Mutex},
	time::Duration,
};

use futures_concurrency::future::Join;
use tokio::{
	sync::Barrier,
	time::{sleep, timeout, Instant},
};
use tracing_test::traced_test;

mod common;

use common::{
	wait_for_status, ConcurrencyProbe, EventLog, SampleError, UntilCancelledWork, PATIENCE,
};

fn holding_spec(probe: &ConcurrencyProbe, rule: Option<&str>, hold: Duration) -> TaskSpec {
	let mut builder = TaskSpec::builder();

	builder.work({
		let probe = probe.clone();
		move || {
			let probe = probe.clone();
			async move {
				probe.hold(hold).await;
				Ok::<_, SampleError>(())
			}
		}
	});

	if let Some(rule) = rule {
		builder.exclusion_rule(ExclusionRule::new(rule).unwrap());
	}

	builder.build().unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[traced_test]
async fn same_exclusion_rule_never_overlaps() {
	let scheduler = LocalScheduler::new(SchedulerConfig::default()).unwrap();
	let probe = ConcurrencyProbe::default();

	let handles = (0..4)
		.map(|_| {
			holding_spec(&probe, Some("lock-A"), Duration::from_millis(40)).schedule(&scheduler)
		})
		.collect::<Vec<_>>();

	let results = handles
		.iter()
		.map(|handle| handle.join())
		.collect::<Vec<_>>()
		.join()
		.await;

	assert!(results.iter().all(|result| result.is_success()));
	assert_eq!(probe.runs(), 4);
	assert_eq!(probe.max(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
#[traced_test]
async fn different_exclusion_rules_run_together() {
	let scheduler = LocalScheduler::new(SchedulerConfig::default()).unwrap();
	let barrier = Arc::new(Barrier::new(2));

	let handles = ["lock-A", "lock-B"]
		.into_iter()
		.map(|rule| {
			let barrier = Arc::clone(&barrier);

			TaskSpec::builder()
				.work(move || {
					let barrier = Arc::clone(&barrier);
					async move {
						// Only passes if both tasks are running at once
						barrier.wait().await;
						Ok::<_, SampleError>(())
					}
				})
				.runs_not_concurrently_named(rule)
				.unwrap()
				.build_and_schedule(&scheduler)
				.unwrap()
		})
		.collect::<Vec<_>>();

	let results = timeout(
		PATIENCE,
		handles
			.iter()
			.map(|handle| handle.join())
			.collect::<Vec<_>>()
			.join(),
	)
	.await
	.expect("tasks with different rules were serialized");

	assert!(results.iter().all(|result| result.is_success()));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[traced_test]
async fn concurrency_cap_is_honored() {
	let scheduler = LocalScheduler::new(SchedulerConfig {
		max_concurrent_tasks: NonZeroUsize::new(2),
		..Default::default()
	})
	.unwrap();
	let probe = ConcurrencyProbe::default();

	let handles = (0..6)
		.map(|_| holding_spec(&probe, None, Duration::from_millis(30)).schedule(&scheduler))
		.collect::<Vec<_>>();

	for handle in &handles {
		handle.join().await;
	}

	assert_eq!(probe.runs(), 6);
	assert!(probe.max() <= 2);
}

#[tokio::test]
#[traced_test]
async fn idle_tasks_wait_for_everything_else() {
	let scheduler = LocalScheduler::new(SchedulerConfig::default()).unwrap();
	let order = Arc::new(Mutex::new(Vec::new()));

	let record = |name: &'static str, hold: Duration| {
		let order = Arc::clone(&order);
		move || {
			let order = Arc::clone(&order);
			async move {
				sleep(hold).await;
				order.lock().unwrap().push(name);
				Ok::<_, SampleError>(())
			}
		}
	};

	let background = TaskSpec::builder()
		.background()
		.work(record("background", Duration::from_millis(80)))
		.build_and_schedule(&scheduler)
		.unwrap();

	let interactive = TaskSpec::builder()
		.interactive()
		.work(record("interactive", Duration::from_millis(40)))
		.build_and_schedule(&scheduler)
		.unwrap();

	wait_for_status(&background, TaskStatus::Running).await;
	wait_for_status(&interactive, TaskStatus::Running).await;

	let idle = TaskSpec::builder()
		.idle()
		.work(record("idle", Duration::ZERO))
		.build_and_schedule(&scheduler)
		.unwrap();

	wait_for_status(&idle, TaskStatus::Waiting).await;

	(idle.join(), background.join(), interactive.join())
		.join()
		.await;

	assert_eq!(*order.lock().unwrap(), ["interactive", "background", "idle"]);
}

#[tokio::test]
#[traced_test]
async fn idle_tasks_run_right_away_when_not_deferred() {
	let scheduler = LocalScheduler::new(SchedulerConfig {
		defer_idle_tasks: false,
		..Default::default()
	})
	.unwrap();

	let background = TaskSpec::builder()
		.work_with_progress(UntilCancelledWork)
		.build_and_schedule(&scheduler)
		.unwrap();

	let idle = TaskSpec::builder()
		.idle()
		.work(|| async { Ok::<_, SampleError>(()) })
		.build_and_schedule(&scheduler)
		.unwrap();

	assert!(timeout(PATIENCE, idle.join()).await.unwrap().is_success());

	background.cancel();
	assert_eq!(background.join().await.outcome(), Outcome::Cancelled);
}

#[tokio::test(start_paused = true)]
#[traced_test]
async fn resubmitting_a_sleeping_task_restarts_its_delay() {
	let scheduler = LocalScheduler::new(SchedulerConfig::default()).unwrap();
	let log = EventLog::default();
	let start = Instant::now();

	let spec = TaskSpec::builder()
		.work(|| async { Ok::<_, SampleError>(()) })
		.listener(log.listener())
		.build()
		.unwrap();

	let handle = spec.schedule_with_delay(&scheduler, Duration::from_secs(1));

	sleep(Duration::from_millis(600)).await;
	let same = spec.schedule_with_delay(&scheduler, Duration::from_secs(1));
	assert_eq!(same.id(), handle.id());
	assert_eq!(scheduler.tracked_tasks(), 1);

	sleep(Duration::from_millis(600)).await;
	assert_eq!(handle.status(), TaskStatus::Sleeping);
	assert_eq!(log.events(), ["scheduled", "rearmed"]);

	assert!(handle.join().await.is_success());
	assert!(start.elapsed() >= Duration::from_millis(1600));
	assert_eq!(
		log.events(),
		["scheduled", "rearmed", "about_to_run", "running", "done"]
	);
}

#[tokio::test]
#[traced_test]
async fn resubmitting_a_running_task_runs_it_once_more() {
	let scheduler = LocalScheduler::new(SchedulerConfig::default()).unwrap();
	let probe = ConcurrencyProbe::default();
	let log = EventLog::default();

	let spec = {
		let mut builder = TaskSpec::builder();
		builder
			.work({
				let probe = probe.clone();
				move || {
					let probe = probe.clone();
					async move {
						probe.hold(Duration::from_millis(50)).await;
						Ok::<_, SampleError>(())
					}
				}
			})
			.listener(log.listener());
		builder.build().unwrap()
	};

	let handle = spec.schedule(&scheduler);
	wait_for_status(&handle, TaskStatus::Running).await;

	// Only the latest of these is kept
	spec.schedule_with_delay(&scheduler, Duration::from_secs(60));
	spec.schedule(&scheduler);

	assert!(handle.join().await.is_success());
	assert_eq!(probe.runs(), 2);
	assert_eq!(probe.max(), 1);
	assert_eq!(
		log.events(),
		[
			"scheduled",
			"about_to_run",
			"running",
			"done",
			"scheduled",
			"about_to_run",
			"running",
			"done"
		]
	);
}

#[tokio::test]
#[traced_test]
async fn resubmitting_a_waiting_task_has_no_effect() {
	let scheduler = LocalScheduler::new(SchedulerConfig::default()).unwrap();
	let probe = ConcurrencyProbe::default();

	let first = holding_spec(&probe, Some("lock-A"), Duration::from_millis(80)).schedule(&scheduler);
	wait_for_status(&first, TaskStatus::Running).await;

	let second_spec = holding_spec(&probe, Some("lock-A"), Duration::from_millis(10));
	let second = second_spec.schedule(&scheduler);
	wait_for_status(&second, TaskStatus::Waiting).await;

	second_spec.schedule(&scheduler);
	second_spec.schedule_with_delay(&scheduler, Duration::from_millis(5));

	first.join().await;
	second.join().await;

	assert_eq!(probe.runs(), 2);
	assert_eq!(probe.max(), 1);
}

#[tokio::test]
#[traced_test]
async fn cancelling_a_running_task_drops_its_pending_rerun() {
	let scheduler = LocalScheduler::new(SchedulerConfig::default()).unwrap();
	let probe = ConcurrencyProbe::default();

	let spec = holding_spec(&probe, None, Duration::from_millis(50));
	let handle = spec.schedule(&scheduler);
	wait_for_status(&handle, TaskStatus::Running).await;

	spec.schedule(&scheduler);
	handle.cancel();

	// Plain work isn't interrupted
	assert!(handle.join().await.is_success());
	assert_eq!(probe.runs(), 1);
}

#[tokio::test]
#[traced_test]
async fn waiting_task_can_be_cancelled() {
	let scheduler = LocalScheduler::new(SchedulerConfig::default()).unwrap();
	let probe = ConcurrencyProbe::default();

	let holder = TaskSpec::builder()
		.work_with_progress(UntilCancelledWork)
		.runs_not_concurrently_named("lock-A")
		.unwrap()
		.build_and_schedule(&scheduler)
		.unwrap();
	wait_for_status(&holder, TaskStatus::Running).await;

	let waiting = holding_spec(&probe, Some("lock-A"), Duration::ZERO).schedule(&scheduler);
	wait_for_status(&waiting, TaskStatus::Waiting).await;

	waiting.cancel();
	assert_eq!(waiting.join().await.outcome(), Outcome::Cancelled);
	assert_eq!(probe.runs(), 0);

	holder.cancel();
	assert_eq!(holder.join().await.outcome(), Outcome::Cancelled);
}

#[tokio::test]
#[traced_test]
async fn group_operations() {
	let scheduler = LocalScheduler::new(SchedulerConfig::default()).unwrap();

	let indexing = (0..3)
		.map(|i| {
			TaskSpec::builder()
				.title(format!("Index location {i}"))
				.unwrap()
				.group("indexing")
				.work_with_progress(UntilCancelledWork)
				.build_and_schedule(&scheduler)
				.unwrap()
		})
		.collect::<Vec<_>>();

	// Group defaults to the title
	let other = TaskSpec::builder()
		.title("Thumbnails")
		.unwrap()
		.work_with_progress(UntilCancelledWork)
		.build_and_schedule(&scheduler)
		.unwrap();

	let found = scheduler.find_group("indexing");
	assert_eq!(found.len(), 3);
	assert!(found
		.iter()
		.all(|handle| indexing.iter().any(|h| h.id() == handle.id())));
	assert_eq!(scheduler.find_group("Thumbnails").len(), 1);
	assert!(scheduler.find_group("nothing").is_empty());

	assert_eq!(scheduler.cancel_group("indexing"), 3);
	let results = scheduler.join_group("indexing").await;
	assert!(results
		.iter()
		.all(|result| result.outcome() == Outcome::Cancelled));
	assert!(indexing.iter().all(|handle| !handle.is_active()));

	assert!(other.is_active());
	scheduler.cancel_all();
	assert_eq!(other.join().await.outcome(), Outcome::Cancelled);
	assert_eq!(scheduler.tracked_tasks(), 0);
}

#[tokio::test]
#[traced_test]
async fn finished_spec_can_be_scheduled_again() {
	let scheduler = LocalScheduler::new(SchedulerConfig::default()).unwrap();
	let probe = ConcurrencyProbe::default();

	let spec = holding_spec(&probe, None, Duration::ZERO);

	assert!(spec.schedule(&scheduler).join().await.is_success());
	assert!(spec.schedule(&scheduler).join().await.is_success());
	assert_eq!(probe.runs(), 2);
}

#[tokio::test]
#[traced_test]
async fn panicking_listener_does_not_stall_the_task() {
	let scheduler = LocalScheduler::new(SchedulerConfig::default()).unwrap();

	let result = TaskSpec::builder()
		.work(|| async { Ok::<_, SampleError>(()) })
		.listener(|_: &TaskSpec, _: &sd_task_builder::TaskEvent| panic!("listener exploded"))
		.build_and_schedule(&scheduler)
		.unwrap()
		.join()
		.await;

	assert!(result.is_success());
}
