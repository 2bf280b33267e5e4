use crate::{
    config::IndexerProcessorConfig,
    models::listing_models::{MarketplaceEvent, NftMarketplaceActivity},
    steps::{projection_step::ProjectionStep, remappers::event_remapper::EventRemapper},
    store::{new_listing_store, ArcListingStore},
    stream::{rpc_stream::RpcEventStream, BlockEvents, EventStream},
    utils::errors::ProcessorError,
};
use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// One block's worth of decoded marketplace events, in log order.
struct RemappedBlock {
    block_number: u64,
    activities: Vec<NftMarketplaceActivity>,
    events: Vec<MarketplaceEvent>,
}

/// Wires the pipeline: event stream -> remapper -> projection. Each stage
/// runs in its own task connected by bounded channels; blocks flow through
/// strictly in order and the projection stage is the single writer.
pub struct Processor {
    pub config: IndexerProcessorConfig,
    store: ArcListingStore,
}

impl Processor {
    pub fn new(config: IndexerProcessorConfig) -> Self {
        Self {
            config,
            store: new_listing_store(),
        }
    }

    /// Handle for readers (the query client). The processor keeps the only
    /// write path.
    pub fn store(&self) -> ArcListingStore {
        self.store.clone()
    }

    pub async fn run_processor(&self) -> Result<()> {
        info!(
            marketplace = %self.config.nft_marketplace_config.name,
            contract_address = %self.config.nft_marketplace_config.contract_address,
            starting_block = self.config.event_stream_config.starting_block,
            "Starting marketplace processor"
        );
        let stream = RpcEventStream::new(
            self.config.event_stream_config.clone(),
            &self.config.nft_marketplace_config.contract_address,
        );
        self.run_with_stream(Box::new(stream)).await
    }

    /// Runs the pipeline over any ordered event source. Tests inject a
    /// static stream here for deterministic replay.
    pub async fn run_with_stream(&self, mut stream: Box<dyn EventStream>) -> Result<()> {
        let channel_size = self.config.channel_size;
        let remapper = EventRemapper::new(&self.config.nft_marketplace_config)?;
        let projection = ProjectionStep::new(self.store.clone());

        let (block_tx, mut block_rx) = mpsc::channel::<BlockEvents>(channel_size);
        let (remapped_tx, mut remapped_rx) = mpsc::channel::<RemappedBlock>(channel_size);

        let stream_handle = tokio::spawn(async move {
            while let Some(batch) = stream.next_batch().await? {
                for block in batch {
                    block_tx.send(block).await.map_err(|_| {
                        ProcessorError::ChannelClosed("block receiver dropped".to_string())
                    })?;
                }
            }
            Ok::<(), ProcessorError>(())
        });

        let remap_handle = tokio::spawn(async move {
            while let Some(block) = block_rx.recv().await {
                let (activities, events) = remapper.remap_events(&block)?;
                remapped_tx
                    .send(RemappedBlock {
                        block_number: block.block_number,
                        activities,
                        events,
                    })
                    .await
                    .map_err(|_| {
                        ProcessorError::ChannelClosed("remapped receiver dropped".to_string())
                    })?;
            }
            Ok::<(), ProcessorError>(())
        });

        while let Some(remapped) = remapped_rx.recv().await {
            let event_count = remapped.events.len();
            projection.process_block(
                remapped.block_number,
                remapped.activities,
                remapped.events,
            );
            if event_count > 0 {
                info!(
                    block_number = remapped.block_number,
                    event_count, "Applied marketplace events"
                );
            } else {
                debug!(block_number = remapped.block_number, "Advanced past empty block");
            }
        }

        remap_handle.await??;
        stream_handle.await??;
        info!("Event stream ended; projection is up to date");
        Ok(())
    }
}
