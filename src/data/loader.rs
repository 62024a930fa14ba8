// ============================================================
// Layer 4 — Batch Loader
// ============================================================
// Builds burn's BatchDataLoader around a dataset and the
// BatchCollator.
//
//   shuffle_seed = Some(s) → reshuffled every epoch from seed s
//   shuffle_seed = None    → dataset order (serial batches)
//   num_workers  > 1       → batches are assembled ahead of the
//                            training loop on a background thread
//
// burn's own multi-thread loader splits the dataset into one
// partition per worker and yields batches as they finish, so the
// order changes from run to run. It is never used here. Prefetching
// goes through OrderedPrefetchLoader instead: one producer walks the
// batches in loader order and a bounded queue of `num_workers`
// batches sits between it and the consumer. The consumer sees
// exactly the sequence a single-threaded loader would produce.
//
// Reference: Burn Book §4 (Datasets and Dataloaders)

use std::{
    panic,
    sync::{mpsc, Arc},
    thread,
};

use burn::data::dataloader::{
    BatchDataLoader, DataLoader, DataLoaderIterator, DynDataLoader, FixBatchStrategy, Progress,
};
use burn::data::dataset::Dataset;
use rand::{rngs::StdRng, SeedableRng};

use crate::data::collator::BatchCollator;
use crate::domain::sample::{Batch, Sample};

#[derive(Debug, Clone, Copy)]
pub struct LoaderOptions {
    pub batch_size:   usize,
    pub shuffle_seed: Option<u64>,
    pub num_workers:  usize,
}

pub fn build_loader<D>(dataset: D, options: LoaderOptions) -> Arc<dyn DataLoader<Batch>>
where
    D: Dataset<Sample> + 'static,
{
    let dataset: Arc<dyn Dataset<Sample>> = Arc::new(dataset);
    let loader = BatchDataLoader::new(
        Box::new(FixBatchStrategy::new(options.batch_size)),
        dataset,
        Box::new(BatchCollator::new()),
        options.shuffle_seed.map(StdRng::seed_from_u64),
    );

    if options.num_workers > 1 {
        return Arc::new(OrderedPrefetchLoader::new(Box::new(loader), options.num_workers));
    }
    Arc::new(loader)
}

// ─── Ordered prefetch ─────────────────────────────────────────────────────────
/// Runs an inner loader on a background thread, keeping at most
/// `depth` finished batches queued. Batch order is the inner
/// loader's order.
pub struct OrderedPrefetchLoader<O> {
    inner: Box<dyn DynDataLoader<O>>,
    depth: usize,
}

impl<O> OrderedPrefetchLoader<O> {
    pub fn new(inner: Box<dyn DynDataLoader<O>>, depth: usize) -> Self {
        Self { inner, depth: depth.max(1) }
    }
}

impl<O> DataLoader<O> for OrderedPrefetchLoader<O>
where
    O: Send + 'static,
{
    fn iter<'a>(&'a self) -> Box<dyn DataLoaderIterator<O> + 'a> {
        let (sender, receiver) = mpsc::sync_channel::<(O, Progress)>(self.depth);
        let loader             = self.inner.clone_dyn();
        let total              = loader.num_items();

        let producer = thread::spawn(move || {
            let mut batches = loader.iter();
            while let Some(batch) = batches.next() {
                // The consumer dropped its iterator: stop early
                if sender.send((batch, batches.progress())).is_err() {
                    return;
                }
            }
        });

        Box::new(OrderedPrefetchIterator {
            receiver,
            producer: Some(producer),
            progress: Progress::new(0, total),
        })
    }

    fn num_items(&self) -> usize {
        self.inner.num_items()
    }
}

struct OrderedPrefetchIterator<O> {
    receiver: mpsc::Receiver<(O, Progress)>,
    producer: Option<thread::JoinHandle<()>>,
    progress: Progress,
}

impl<O> Iterator for OrderedPrefetchIterator<O> {
    type Item = O;

    fn next(&mut self) -> Option<O> {
        match self.receiver.recv() {
            Ok((batch, progress)) => {
                self.progress = progress;
                Some(batch)
            }
            // Producer finished (or died); surface its panic on this thread
            Err(_) => {
                if let Some(producer) = self.producer.take() {
                    if let Err(payload) = producer.join() {
                        panic::resume_unwind(payload);
                    }
                }
                None
            }
        }
    }
}

impl<O> DataLoaderIterator<O> for OrderedPrefetchIterator<O> {
    fn progress(&self) -> Progress {
        self.progress.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::sample::EDGE_FEATURES;
    use burn::data::dataset::InMemDataset;
    use ndarray::{arr0, arr1};

    fn samples(n: usize) -> Vec<Sample> {
        (0..n)
            .map(|i| Sample::new().with_field("id", arr0(i as f32).into_dyn()))
            .collect()
    }

    fn ids(loader: &dyn DataLoader<Batch>) -> Vec<Vec<f32>> {
        loader
            .iter()
            .map(|batch| batch.get("id").unwrap().iter().copied().collect())
            .collect()
    }

    #[test]
    fn test_serial_loader_keeps_order_and_short_tail() {
        let options = LoaderOptions { batch_size: 2, shuffle_seed: None, num_workers: 1 };
        let loader  = build_loader(InMemDataset::new(samples(5)), options);

        assert_eq!(
            ids(loader.as_ref()),
            vec![vec![0.0, 1.0], vec![2.0, 3.0], vec![4.0]]
        );
    }

    #[test]
    fn test_shuffled_loader_covers_every_sample() {
        let options = LoaderOptions { batch_size: 3, shuffle_seed: Some(9), num_workers: 1 };
        let loader  = build_loader(InMemDataset::new(samples(7)), options);

        let mut seen: Vec<f32> = ids(loader.as_ref()).into_iter().flatten().collect();
        seen.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(seen, (0..7).map(|i| i as f32).collect::<Vec<_>>());
    }

    #[test]
    fn test_workers_keep_serial_order_on_every_pass() {
        let options  = LoaderOptions { batch_size: 2, shuffle_seed: None, num_workers: 4 };
        let loader   = build_loader(InMemDataset::new(samples(41)), options);
        let expected: Vec<Vec<f32>> = (0..41)
            .collect::<Vec<usize>>()
            .chunks(2)
            .map(|c| c.iter().map(|&i| i as f32).collect())
            .collect();

        for _ in 0..50 {
            assert_eq!(ids(loader.as_ref()), expected);
        }
    }

    #[test]
    fn test_workers_match_single_thread_shuffle() {
        let single = LoaderOptions { batch_size: 3, shuffle_seed: Some(11), num_workers: 1 };
        let pooled = LoaderOptions { num_workers: 4, ..single };

        let a = build_loader(InMemDataset::new(samples(23)), single);
        let b = build_loader(InMemDataset::new(samples(23)), pooled);

        // Every epoch reshuffles; both loaders advance the same seed stream
        for _ in 0..5 {
            assert_eq!(ids(a.as_ref()), ids(b.as_ref()));
        }
    }

    #[test]
    fn test_prefetch_reports_progress_and_item_count() {
        let options = LoaderOptions { batch_size: 4, shuffle_seed: None, num_workers: 2 };
        let loader  = build_loader(InMemDataset::new(samples(10)), options);
        assert_eq!(loader.num_items(), 10);

        let mut batches = loader.iter();
        while batches.next().is_some() {}
        assert_eq!(batches.progress().items_processed, 10);
        assert_eq!(batches.progress().items_total, 10);
    }

    #[test]
    fn test_early_drop_does_not_hang() {
        let options = LoaderOptions { batch_size: 1, shuffle_seed: None, num_workers: 2 };
        let loader  = build_loader(InMemDataset::new(samples(100)), options);

        let first: Vec<Batch> = loader.iter().take(3).collect();
        assert_eq!(first.len(), 3);
        assert_eq!(ids(loader.as_ref()).len(), 100);
    }

    #[test]
    #[should_panic(expected = "batch collation failed")]
    fn test_collation_panic_reaches_consumer() {
        let mut items = samples(3);
        items[1] = Sample::new().with_field(EDGE_FEATURES, arr1(&[1.0f32]).into_dyn());

        let options = LoaderOptions { batch_size: 3, shuffle_seed: None, num_workers: 2 };
        let loader  = build_loader(InMemDataset::new(items), options);
        let _       = ids(loader.as_ref());
    }
}
