//! Course JSON assembly
//!
//! Retrieves the six course collections and flattens nested settings into
//! their parent records. Collections are independent reads, so they are
//! fetched concurrently; the first failure aborts the assembly and the
//! partially fetched collections are dropped with it.

use aat_common::model::{flatten_object, Record};
use aat_common::store::{ContentPlugin, ContentStore, Filter, RetrieveOptions, SortOrder};
use aat_common::constants::SORT_ORDER_FIELD;
use aat_common::{Collection, CourseDocument, Error, Result};
use futures::future::try_join_all;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Builds a [`CourseDocument`] from the content store
#[derive(Clone)]
pub struct CourseJsonAssembler {
    store: Arc<dyn ContentStore>,
    config_plugin: Arc<dyn ContentPlugin>,
}

impl CourseJsonAssembler {
    pub fn new(store: Arc<dyn ContentStore>, config_plugin: Arc<dyn ContentPlugin>) -> Self {
        Self {
            store,
            config_plugin,
        }
    }

    /// Retrieve and flatten every collection of `course_id`
    pub async fn assemble(&self, tenant_id: &str, course_id: &str) -> Result<CourseDocument> {
        info!("Retrieving JSON for course {}", course_id);

        let fetches = Collection::ALL
            .iter()
            .map(|&collection| self.fetch_collection(tenant_id, course_id, collection));

        let fetched = try_join_all(fetches).await.map_err(|e| {
            error!("Failed to retrieve course {}: {}", course_id, e);
            e
        })?;

        let mut document = CourseDocument::new(course_id);
        for (collection, records) in fetched {
            document.set_collection(collection, records)?;
        }

        debug!(
            "Assembled course {}: {} content objects, {} articles, {} blocks, {} components",
            course_id,
            document.content_objects.len(),
            document.articles.len(),
            document.blocks.len(),
            document.components.len()
        );
        Ok(document)
    }

    async fn fetch_collection(
        &self,
        tenant_id: &str,
        course_id: &str,
        collection: Collection,
    ) -> Result<(Collection, Vec<Record>)> {
        let filter = retrieval_filter(collection, course_id);

        if collection == Collection::Config {
            let mut configs = self
                .config_plugin
                .retrieve(tenant_id, &filter, &RetrieveOptions::default())
                .await?;
            if configs.len() != 1 {
                return Err(Error::Retrieval(format!(
                    "Unable to retrieve config.json for course {} ({} records)",
                    course_id,
                    configs.len()
                )));
            }
            for config in configs.iter_mut() {
                flatten_object(config, "_extensions");
                flatten_object(config, "menuSettings");
            }
            return Ok((collection, configs));
        }

        let options = RetrieveOptions::sorted_by(SORT_ORDER_FIELD, SortOrder::Ascending);
        let records = self
            .store
            .retrieve(tenant_id, collection.name(), &filter, &options)
            .await?;

        let mut records = self.store.export_results(records);
        for record in records.iter_mut() {
            flatten_object(record, "menuSettings");
        }
        Ok((collection, records))
    }
}

/// `{_id: courseId}` for the course itself, `{_courseId: courseId}` otherwise
pub fn retrieval_filter(collection: Collection, course_id: &str) -> Filter {
    match collection {
        Collection::Course => Filter::eq("_id", course_id),
        _ => Filter::eq("_courseId", course_id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retrieval_filter() {
        assert_eq!(retrieval_filter(Collection::Course, "c1"), Filter::eq("_id", "c1"));
        assert_eq!(retrieval_filter(Collection::Block, "c1"), Filter::eq("_courseId", "c1"));
        assert_eq!(retrieval_filter(Collection::Config, "c1"), Filter::eq("_courseId", "c1"));
    }
}
