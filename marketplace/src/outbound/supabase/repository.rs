//! PostgREST table and RPC access shared by the Supabase data adapters.
//!
//! Port implementations live next to this file, one per table; this module
//! only knows how to select, insert, patch, delete and call functions.

use std::sync::Arc;

use reqwest::Method;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use uuid::Uuid;

use super::client::{HttpFailure, SupabaseClient, eq};
use super::dto::{PostgrestError, UNIQUE_VIOLATION};

/// Supabase-backed repositories for every data port.
pub struct SupabaseRepository {
    client: Arc<SupabaseClient>,
}

impl SupabaseRepository {
    pub fn new(client: Arc<SupabaseClient>) -> Self {
        Self { client }
    }

    /// `GET /rest/v1/{table}` with equality `filters`, newest first when
    /// `order` names a column.
    pub(super) async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        filters: &[(&str, String)],
        order: Option<&str>,
    ) -> Result<Vec<T>, HttpFailure> {
        let url = self.client.table_url(table)?;
        let mut query: Vec<(&str, String)> = vec![("select", "*".to_owned())];
        query.extend(filters.iter().map(|(column, value)| (*column, eq(value))));
        if let Some(column) = order {
            query.push(("order", format!("{column}.desc")));
        }
        SupabaseClient::send_json(self.client.request(Method::GET, url, None).query(&query)).await
    }

    /// First row with `id`.
    pub(super) async fn find<T: DeserializeOwned>(
        &self,
        table: &str,
        id: &Uuid,
    ) -> Result<Option<T>, HttpFailure> {
        let rows = self.select(table, &[("id", id.to_string())], None).await?;
        Ok(rows.into_iter().next())
    }

    pub(super) async fn insert_row<T: Serialize + ?Sized>(
        &self,
        table: &str,
        row: &T,
    ) -> Result<(), HttpFailure> {
        let url = self.client.table_url(table)?;
        SupabaseClient::send_empty(
            self.client
                .request(Method::POST, url, None)
                .header("Prefer", "return=minimal")
                .json(row),
        )
        .await
    }

    /// Patch row `id`. Returns whether a row matched.
    pub(super) async fn patch<T: Serialize + ?Sized>(
        &self,
        table: &str,
        id: &Uuid,
        row: &T,
    ) -> Result<bool, HttpFailure> {
        let url = self.client.table_url(table)?;
        let touched: Vec<Value> = SupabaseClient::send_json(
            self.client
                .request(Method::PATCH, url, None)
                .query(&[("id", eq(id))])
                .header("Prefer", "return=representation")
                .json(row),
        )
        .await?;
        Ok(!touched.is_empty())
    }

    /// Delete row `id`. Returns whether a row matched.
    pub(super) async fn delete_row(&self, table: &str, id: &Uuid) -> Result<bool, HttpFailure> {
        let url = self.client.table_url(table)?;
        let removed: Vec<Value> = SupabaseClient::send_json(
            self.client
                .request(Method::DELETE, url, None)
                .query(&[("id", eq(id))])
                .header("Prefer", "return=representation"),
        )
        .await?;
        Ok(!removed.is_empty())
    }

    /// `POST /rest/v1/rpc/{function}`.
    pub(super) async fn rpc<A, T>(&self, function: &str, args: &A) -> Result<T, HttpFailure>
    where
        A: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.client.rpc_url(function)?;
        SupabaseClient::send_json(self.client.request(Method::POST, url, None).json(args)).await
    }
}

/// Whether `failure` is a Postgres unique-constraint rejection.
pub(super) fn is_unique_violation(failure: &HttpFailure) -> bool {
    serde_json::from_str::<PostgrestError>(failure.body())
        .ok()
        .and_then(|body| body.code)
        .is_some_and(|code| code == UNIQUE_VIOLATION)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(r#"{"code":"23505","message":"duplicate key value"}"#, true)]
    #[case(r#"{"code":"42501","message":"permission denied"}"#, false)]
    #[case("not json", false)]
    fn recognises_unique_violations(#[case] body: &str, #[case] expected: bool) {
        let failure = HttpFailure::Status {
            status: 409,
            body: body.to_owned(),
        };
        assert_eq!(is_unique_violation(&failure), expected);
    }
}
