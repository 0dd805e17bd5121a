use rb_pool_tree::{Limited, Pool, PoolConfig, RbTree};

fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let config = PoolConfig {
        batch: 8,
        ..PoolConfig::default()
    };
    let pool = Pool::with_system(config, Limited::new(4096)).unwrap();
    let mut tree = RbTree::with_pool(pool);

    let mut inserted = 0u64;
    while let Ok((_, true)) = tree.insert_unique(inserted) {
        inserted += 1;
    }
    println!("the pool ran dry after {inserted} nodes");
    println!("stats: {:?}", tree.pool().stats());

    // the failed insert left the tree intact
    tree.validate().unwrap();
    assert_eq!(tree.len() as u64, inserted);

    // erased nodes go back to the free list and are reused
    for k in 0..10 {
        let _ignore = tree.erase_key(&k);
    }
    for k in inserted..inserted + 10 {
        let _ignore = tree.insert_unique(k).unwrap();
    }
    println!("after recycling: len={} stats={:?}", tree.len(), tree.pool().stats());
}
