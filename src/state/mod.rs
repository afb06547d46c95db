use std::sync::Arc;
use std::time::{Duration, Instant};

use moka::future::Cache;

use crate::attendance::AttendanceLedger;
use crate::ballot::{BallotEngine, TallyKey};
use crate::ballot::tally::Tally;
use crate::config::{ApiConfig, CacheConfig};
use crate::live::LiveVoteCache;
use crate::proxy::ProxyRegistry;
use crate::store::VotingStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn VotingStore>,
    pub ballots: BallotEngine,
    pub attendance: AttendanceLedger,
    pub proxies: ProxyRegistry,
    pub live: Arc<LiveVoteCache>,
    pub cache: Arc<ApiCache>,
    pub start_time: Instant,
}

impl AppState {
    /// Wires the engine components around one store and one live cache.
    pub fn new(store: Arc<dyn VotingStore>, config: &ApiConfig) -> Self {
        let cache = Arc::new(ApiCache::new(&config.cache));
        let live = Arc::new(LiveVoteCache::new(config.live.subscriber_buffer));
        let proxies = ProxyRegistry::new(Arc::clone(&store));
        let attendance = AttendanceLedger::new(
            Arc::clone(&store),
            proxies.clone(),
            config.assembly.quorum_basis,
        );
        let ballots = BallotEngine::new(
            Arc::clone(&store),
            attendance.clone(),
            proxies.clone(),
            Arc::clone(&live),
            cache.results.clone(),
        );
        Self {
            store,
            ballots,
            attendance,
            proxies,
            live,
            cache,
            start_time: Instant::now(),
        }
    }
}

pub struct ApiCache {
    pub results: Cache<TallyKey, Arc<Tally>>,
    pub results_capacity: u64,
}

impl ApiCache {
    pub fn new(config: &CacheConfig) -> Self {
        assert!(
            config.results_max_capacity >= 10,
            "Results cache capacity threshold"
        );

        let results = Cache::builder()
            .max_capacity(config.results_max_capacity)
            .time_to_live(config.results_ttl())
            .time_to_idle(Duration::from_secs(config.results_ttl_seconds / 2 + 1))
            .build();

        Self {
            results,
            results_capacity: config.results_max_capacity,
        }
    }
}
