use crate::{
    client::QuartzBioClient,
    error::QuartzBioResult,
    models::Dataset,
    query::{BatchQuery, Query},
};

/// Dataset API operations
pub struct DatasetApi<'a> {
    client: &'a QuartzBioClient,
}

impl<'a> DatasetApi<'a> {
    pub fn new(client: &'a QuartzBioClient) -> Self {
        Self { client }
    }

    /// Get information about a Dataset
    ///
    /// # Arguments
    /// * `dataset_id` - Numeric id of the dataset
    pub async fn get(&self, dataset_id: &str) -> QuartzBioResult<Dataset> {
        let path = format!("/v2/datasets/{}", urlencoding::encode(dataset_id));
        self.client.get(&path).await
    }

    /// Start a lazy query over the records of a Dataset.
    /// Nothing is sent until results are read.
    ///
    /// # Arguments
    /// * `dataset_id` - Numeric id of the dataset
    pub fn query(&self, dataset_id: &str) -> Query {
        Query::new(self.client.clone(), dataset_id)
    }

    /// Group dataset queries into one request
    ///
    /// # Arguments
    /// * `queries` - Queries to send, results come back in this order
    pub fn batch_query(&self, queries: Vec<Query>) -> BatchQuery {
        BatchQuery::new(queries)
    }
}
