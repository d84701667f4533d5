use crate::core::errors::ExchangeError;
use crate::core::kernel::{paginate, Page, PageRequest, RestClient};
use crate::exchanges::coinbase_pro::rest::CoinbaseProRest;
use crate::exchanges::coinbase_pro::types::{Account, AccountActivity};
use futures_util::future::FutureExt;
use futures_util::stream::BoxStream;

/// Authenticated account endpoints
#[derive(Debug, Clone)]
pub struct Accounts<R: RestClient> {
    rest: CoinbaseProRest<R>,
}

impl<R: RestClient + Clone> Accounts<R> {
    pub fn new(rest: &R) -> Self {
        Self {
            rest: CoinbaseProRest::new(rest.clone()),
        }
    }
}

impl<R: RestClient> Accounts<R> {
    pub async fn get_accounts(&self) -> Result<Vec<Account>, ExchangeError> {
        self.rest.get_accounts().await
    }

    pub async fn get_account(&self, account_id: &str) -> Result<Account, ExchangeError> {
        self.rest.get_account(account_id).await
    }

    /// One page of ledger activity for an account
    pub async fn get_account_history(
        &self,
        account_id: &str,
        page: &PageRequest,
    ) -> Result<Page<AccountActivity>, ExchangeError> {
        self.rest.get_account_history(account_id, page).await
    }
}

impl<R: RestClient + Clone + 'static> Accounts<R> {
    pub fn stream_account_history(
        &self,
        account_id: &str,
        first: PageRequest,
        max_pages: Option<usize>,
    ) -> BoxStream<'static, Result<AccountActivity, ExchangeError>> {
        let rest = self.rest.clone();
        let account_id = account_id.to_string();

        paginate(first, max_pages, move |request: PageRequest| {
            let rest = rest.clone();
            let account_id = account_id.clone();
            async move { rest.get_account_history(&account_id, &request).await }.boxed()
        })
    }
}
