//! The update engine.
//!
//! A cycle walks the configured keys strictly one after another:
//! fetch, combine, price gas, submit, then pause for the inter-step delay.
//! A failing key is recorded and the cycle moves on to the next key. Cycles
//! run once at startup and then on a fixed period; they never overlap and a
//! tick that lands while a cycle is still running is dropped.

use crate::event_bus::EventBus;
use crate::{FeederError, UpdateError};
use feeder_config::FeederSettings;
use feeder_delivery::DeliveryService;
use feeder_pricing::{self as pricing, ScaleFactor};
use feeder_quotation::{QuotationService, RankingService};
use feeder_types::{
	direct_key, pair_key, DerivedUpdate, FeedMode, FeederEvent, Quotation, SubmissionResult,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Pseudo-key under which a failed ranking call is reported.
pub const RANKING_KEY: &str = "ranking";

/// An update that reached the node.
#[derive(Debug, Clone)]
pub struct Published {
	pub update: DerivedUpdate,
	pub submission: SubmissionResult,
}

/// Result of a single key within a cycle.
#[derive(Debug)]
pub struct KeyOutcome {
	pub key: String,
	pub result: Result<Published, UpdateError>,
}

/// Summary of one cycle.
#[derive(Debug)]
pub struct CycleReport {
	pub cycle: u64,
	pub outcomes: Vec<KeyOutcome>,
	/// Shutdown stopped the cycle before every key was attempted.
	pub interrupted: bool,
}

impl CycleReport {
	pub fn successes(&self) -> usize {
		self.outcomes.iter().filter(|o| o.result.is_ok()).count()
	}

	pub fn failures(&self) -> usize {
		self.outcomes.iter().filter(|o| o.result.is_err()).count()
	}

	/// At least one key was attempted and none succeeded.
	pub fn all_failed(&self) -> bool {
		!self.outcomes.is_empty() && self.successes() == 0
	}
}

/// Resolves once shutdown is requested. Never resolves if the sender is gone.
async fn cancelled(shutdown: &mut watch::Receiver<bool>) {
	if shutdown.wait_for(|stop| *stop).await.is_err() {
		std::future::pending::<()>().await;
	}
}

fn unix_now() -> u64 {
	chrono::Utc::now().timestamp().max(0) as u64
}

pub struct UpdateEngine {
	settings: FeederSettings,
	scale: ScaleFactor,
	quotation: Arc<QuotationService>,
	ranking: Option<Arc<RankingService>>,
	delivery: Arc<DeliveryService>,
	event_bus: EventBus,
	in_progress: Mutex<()>,
	cycles: AtomicU64,
}

impl UpdateEngine {
	pub fn new(
		settings: FeederSettings,
		quotation: Arc<QuotationService>,
		ranking: Option<Arc<RankingService>>,
		delivery: Arc<DeliveryService>,
		event_bus: EventBus,
	) -> Result<Self, FeederError> {
		if settings.mode == FeedMode::Batch && ranking.is_none() {
			return Err(FeederError::Config(
				"batch mode requires a ranking source".into(),
			));
		}

		Ok(Self {
			scale: ScaleFactor::new(settings.scale_factor),
			settings,
			quotation,
			ranking,
			delivery,
			event_bus,
			in_progress: Mutex::new(()),
			cycles: AtomicU64::new(0),
		})
	}

	pub fn event_bus(&self) -> &EventBus {
		&self.event_bus
	}

	pub fn settings(&self) -> &FeederSettings {
		&self.settings
	}

	/// Checks the node and resolves the oracle contract.
	pub async fn prepare(&self) -> Result<(), FeederError> {
		self.delivery
			.prepare()
			.await
			.map(|_| ())
			.map_err(|e| FeederError::Service(e.to_string()))
	}

	/// Runs cycles until `shutdown` turns true.
	///
	/// The first cycle starts immediately. When a cycle overruns the period
	/// the missed tick is dropped and the timer restarts a full period after
	/// the cycle ended.
	pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
		let period = self.settings.cycle_interval();
		let mut ticker = tokio::time::interval(period);
		ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

		info!(
			name = %self.settings.name,
			mode = %self.settings.mode,
			interval_secs = period.as_secs(),
			"Update engine started"
		);

		loop {
			let stop = tokio::select! {
				biased;
				_ = cancelled(&mut shutdown) => true,
				_ = ticker.tick() => false,
			};
			if stop {
				break;
			}

			let started = Instant::now();
			if let Err(e) = self.run_cycle(&shutdown).await {
				warn!(error = %e, "Skipping tick");
			}

			if started.elapsed() >= period {
				debug!("Cycle overran its period, re-arming timer");
				ticker.reset();
			}
		}

		info!("Update engine stopped");
	}

	/// Runs one cycle, or fails with [`FeederError::CycleInProgress`] if
	/// another one is running.
	pub async fn run_cycle(
		&self,
		shutdown: &watch::Receiver<bool>,
	) -> Result<CycleReport, FeederError> {
		let _guard = self
			.in_progress
			.try_lock()
			.map_err(|_| FeederError::CycleInProgress)?;

		let mut shutdown = shutdown.clone();
		let cycle = self.cycles.fetch_add(1, Ordering::SeqCst) + 1;
		let mut report = CycleReport {
			cycle,
			outcomes: Vec::new(),
			interrupted: false,
		};

		info!(cycle, mode = %self.settings.mode, "Cycle started");
		self.event_bus
			.publish(FeederEvent::CycleStarted {
				cycle,
				mode: self.settings.mode,
			})
			.ok();

		match self.settings.mode {
			FeedMode::Pair => self.pair_cycle(&mut report, &mut shutdown).await,
			FeedMode::Batch => self.batch_cycle(&mut report, &mut shutdown).await,
		}

		let (successes, failures) = (report.successes(), report.failures());
		info!(
			cycle,
			successes,
			failures,
			interrupted = report.interrupted,
			"Cycle completed"
		);
		self.event_bus
			.publish(FeederEvent::CycleCompleted {
				cycle,
				successes,
				failures,
				interrupted: report.interrupted,
			})
			.ok();

		Ok(report)
	}

	async fn pair_cycle(&self, report: &mut CycleReport, shutdown: &mut watch::Receiver<bool>) {
		// Outer None: base not fetched yet this cycle.
		let mut base_quote: Option<Option<Quotation>> = None;

		for symbol in &self.settings.symbols {
			if *shutdown.borrow() {
				report.interrupted = true;
				return;
			}

			let key = direct_key(symbol);
			let quote = match self.quotation.fetch(symbol).await {
				Ok(quote) => {
					let timestamp = self.timestamp(&[&quote]);
					let result = self
						.deliver(pricing::direct(&quote, self.scale, timestamp))
						.await;
					self.record(report, key, result);
					Some(quote)
				}
				Err(source) => {
					let error = UpdateError::Fetch {
						symbol: symbol.clone(),
						source,
					};
					self.record(report, key, Err(error));
					None
				}
			};

			if self.pause(shutdown).await {
				report.interrupted = true;
				return;
			}

			let Some(base) = &self.settings.pair_base else {
				continue;
			};

			let key = pair_key(symbol, base);
			let base_result = match &base_quote {
				Some(Some(cached)) => Ok(cached.clone()),
				Some(None) => Err(UpdateError::Unavailable {
					symbol: base.clone(),
				}),
				None => {
					let fetched = self.quotation.fetch(base).await;
					base_quote = Some(fetched.as_ref().ok().cloned());
					fetched.map_err(|source| UpdateError::Fetch {
						symbol: base.clone(),
						source,
					})
				}
			};

			let result = match (quote, base_result) {
				(_, Err(e)) => Err(e),
				(None, Ok(_)) => Err(UpdateError::Unavailable {
					symbol: symbol.clone(),
				}),
				(Some(quote), Ok(base)) => {
					let timestamp = self.timestamp(&[&quote, &base]);
					self.deliver(pricing::pair(&quote, &base, self.scale, timestamp))
						.await
				}
			};
			self.record(report, key, result);

			if self.pause(shutdown).await {
				report.interrupted = true;
				return;
			}
		}
	}

	async fn batch_cycle(&self, report: &mut CycleReport, shutdown: &mut watch::Receiver<bool>) {
		let Some(ranking) = &self.ranking else {
			return;
		};

		let ranked = match ranking.top_symbols(self.settings.batch_size).await {
			Ok(symbols) => symbols,
			Err(e) => {
				self.record(report, RANKING_KEY.to_string(), Err(UpdateError::Ranking(e)));
				return;
			}
		};
		debug!(count = ranked.len(), "Fetched ranking");

		if self.pause(shutdown).await {
			report.interrupted = true;
			return;
		}

		let mut seen = HashSet::new();
		for symbol in ranked {
			if !seen.insert(symbol.clone()) {
				debug!(symbol = %symbol, "Skipping duplicate ranked symbol");
				continue;
			}
			if *shutdown.borrow() {
				report.interrupted = true;
				return;
			}

			let key = direct_key(&symbol);
			let fetched = match &self.settings.foreign_source {
				Some(source) => self.quotation.fetch_foreign(source, &symbol).await,
				None => self.quotation.fetch(&symbol).await,
			};
			let result = match fetched {
				Ok(quote) => {
					let timestamp = self.timestamp(&[&quote]);
					self.deliver(pricing::direct(&quote, self.scale, timestamp))
						.await
				}
				Err(source) => Err(UpdateError::Fetch { symbol, source }),
			};
			self.record(report, key, result);

			if self.pause(shutdown).await {
				report.interrupted = true;
				return;
			}
		}
	}

	fn timestamp(&self, quotations: &[&Quotation]) -> u64 {
		pricing::update_timestamp(self.settings.timestamp_source, quotations, unix_now())
	}

	async fn deliver(
		&self,
		update: Result<DerivedUpdate, pricing::PriceError>,
	) -> Result<Published, UpdateError> {
		let update = update?;
		debug!(update = %update, "Submitting update");
		let submission = self.delivery.submit(&update).await?;
		Ok(Published { update, submission })
	}

	fn record(&self, report: &mut CycleReport, key: String, result: Result<Published, UpdateError>) {
		let cycle = report.cycle;
		match &result {
			Ok(published) => {
				info!(
					cycle,
					key = %key,
					value = published.update.scaled_value,
					tx_hash = %published.submission.transaction_hash.truncated(),
					"Update submitted"
				);
				self.event_bus
					.publish(FeederEvent::UpdateSubmitted {
						cycle,
						key: key.clone(),
						scaled_value: published.update.scaled_value,
						tx_hash: published.submission.transaction_hash.clone(),
					})
					.ok();
			}
			Err(e) => {
				warn!(cycle, key = %key, error = %e, "Update failed");
				self.event_bus
					.publish(FeederEvent::UpdateFailed {
						cycle,
						key: key.clone(),
						reason: e.to_string(),
					})
					.ok();
			}
		}
		report.outcomes.push(KeyOutcome { key, result });
	}

	/// Sleeps for the inter-step delay. Returns true if shutdown was requested.
	async fn pause(&self, shutdown: &mut watch::Receiver<bool>) -> bool {
		let interrupted = tokio::select! {
			_ = tokio::time::sleep(self.settings.inter_step_delay()) => false,
			_ = cancelled(shutdown) => true,
		};
		interrupted || *shutdown.borrow()
	}
}
