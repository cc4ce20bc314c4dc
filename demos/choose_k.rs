use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use xmeans::cluster::{KmeansOptimizer, ModelSearch, Selector, XMeans};
use xmeans::{Dataset, Loss};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Run with RUST_LOG=debug to see every split decision.
    env_logger::init();

    // Three Gaussian blobs in 2D, 40 points each: a close pair and a far
    // one. The first BIC split separates the far blob, the second the pair.
    let centers = [(0.0, 0.0), (6.0, 0.0), (40.0, 3.0)];
    let noise = Normal::new(0.0, 0.7)?;
    let mut rng = StdRng::seed_from_u64(17);
    let mut rows = Vec::new();
    for &(cx, cy) in &centers {
        for _ in 0..40 {
            rows.push(vec![cx + noise.sample(&mut rng), cy + noise.sample(&mut rng)]);
        }
    }
    let data = Dataset::from_rows(&rows)?;

    // Sweep k = 2..=8 and pick the elbow of the BIC curve.
    let mut sweep = KmeansOptimizer::new(8, 10)
        .with_selector(Selector::Elbow)
        .with_seed(1)
        .start(&data)?;
    while !sweep.is_done() {
        sweep.step()?;
    }
    println!("k sweep (bic):");
    for (k, score) in sweep.scores() {
        println!("  k={k:<2} score={score:.2}");
    }
    if let Some(chosen) = sweep.result() {
        println!("elbow picks k={} sizes={:?}", chosen.k(), chosen.cluster_sizes());
    }

    // Grow k from one cluster by split tests.
    let mut search = XMeans::new(1, 10)
        .with_loss(Loss::Bic)
        .with_split_tries(4)
        .with_seed(1)
        .start(&data)?;
    while !search.is_done() {
        search.step()?;
        println!(
            "x-means pass {}: k={} ({:.0}%)",
            search.passes(),
            search.centroids().nrows(),
            search.progress()
        );
    }
    let best = search.run()?;
    println!("x-means picks k={} sizes={:?}", best.k(), best.cluster_sizes());
    for (c, &rep) in best.representatives().iter().enumerate() {
        println!("  cluster {c}: representative point {rep} {:?}", rows[rep]);
    }

    Ok(())
}
