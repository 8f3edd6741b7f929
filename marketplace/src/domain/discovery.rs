//! Broker discovery: proximity search, client-side filters, search log.

use std::sync::Arc;

use tracing::debug;

use crate::domain::ports::{
    BrokerDirectory, BrokerDirectoryError, NearbyQuery, SearchLogRepository,
};
use crate::domain::{BrokerFilters, BrokerProfile, Error, SearchLogger, UserId, filter_brokers};

/// Finds brokers near a point and narrows them with [`BrokerFilters`].
pub struct BrokerDiscovery<D: ?Sized, L: ?Sized> {
    directory: Arc<D>,
    logger: SearchLogger<L>,
}

impl<D, L> BrokerDiscovery<D, L>
where
    D: BrokerDirectory + ?Sized,
    L: SearchLogRepository + ?Sized,
{
    pub fn new(directory: Arc<D>, search_log: Arc<L>) -> Self {
        Self {
            directory,
            logger: SearchLogger::new(search_log),
        }
    }

    fn map_directory_error(error: BrokerDirectoryError) -> Error {
        match error {
            BrokerDirectoryError::Connection { message } => {
                Error::service_unavailable(format!("broker directory unavailable: {message}"))
            }
            BrokerDirectoryError::Query { message } => {
                Error::internal(format!("broker directory error: {message}"))
            }
        }
    }

    /// Brokers around `query` before any filtering.
    pub async fn nearby(&self, query: &NearbyQuery) -> Result<Vec<BrokerProfile>, Error> {
        self.directory
            .nearby(query)
            .await
            .map_err(Self::map_directory_error)
    }

    /// Run a search and record it in the search log.
    pub async fn search(
        &self,
        searcher: Option<&UserId>,
        query: &NearbyQuery,
        filters: &BrokerFilters,
    ) -> Result<Vec<BrokerProfile>, Error> {
        let nearby = self.nearby(query).await?;
        let matches = filter_brokers(&nearby, filters);
        debug!(
            nearby = nearby.len(),
            matches = matches.len(),
            active_filters = filters.active_count(),
            "broker search"
        );
        self.logger.record(searcher, filters, matches.len()).await;
        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::domain::ErrorCode;
    use crate::domain::ports::{MockBrokerDirectory, MockSearchLogRepository, SearchLogError};
    use crate::test_support::broker_profile;

    fn directory() -> MockBrokerDirectory {
        let mut directory = MockBrokerDirectory::new();
        directory.expect_nearby().returning(|_| {
            Ok(vec![
                broker_profile("Amina Properties", &["Real Estate"], 4.8),
                broker_profile("Juma Motors", &["Car Sales"], 4.1),
            ])
        });
        directory
    }

    #[rstest]
    #[tokio::test]
    async fn filters_and_logs_the_match_count() {
        let mut log = MockSearchLogRepository::new();
        log.expect_record()
            .withf(|entry| entry.results_count == 1 && entry.search_query == "motors")
            .times(1)
            .return_once(|_| Ok(()));
        let discovery = BrokerDiscovery::new(Arc::new(directory()), Arc::new(log));
        let filters = BrokerFilters {
            query: "motors".to_owned(),
            ..BrokerFilters::default()
        };

        let found = discovery
            .search(None, &NearbyQuery::default(), &filters)
            .await
            .expect("search");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "Juma Motors");
    }

    #[rstest]
    #[tokio::test]
    async fn log_failures_do_not_fail_the_search() {
        let mut log = MockSearchLogRepository::new();
        log.expect_record()
            .return_once(|_| Err(SearchLogError::write("offline")));
        let discovery = BrokerDiscovery::new(Arc::new(directory()), Arc::new(log));

        let found = discovery
            .search(None, &NearbyQuery::default(), &BrokerFilters::default())
            .await
            .expect("search");
        assert_eq!(found.len(), 2);
    }

    #[rstest]
    #[tokio::test]
    async fn directory_outage_is_surfaced_and_not_logged() {
        let mut directory = MockBrokerDirectory::new();
        directory
            .expect_nearby()
            .return_once(|_| Err(BrokerDirectoryError::connection("dns")));
        let mut log = MockSearchLogRepository::new();
        log.expect_record().never();
        let discovery = BrokerDiscovery::new(Arc::new(directory), Arc::new(log));

        let err = discovery
            .search(None, &NearbyQuery::default(), &BrokerFilters::default())
            .await
            .expect_err("outage");
        assert_eq!(err.code(), ErrorCode::ServiceUnavailable);
    }
}
