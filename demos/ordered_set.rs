use rb_pool_tree::{First, Less, OrderedSet, Pool, RbTree};

fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .init();

    let text = "the quick brown fox jumps over the lazy dog the end";

    let mut words = OrderedSet::new();
    for word in text.split_whitespace() {
        let _ignore = words.insert(word).unwrap();
    }
    println!("distinct words: {words:?}");
    println!(
        "words from 'f' to 'p': {:?}",
        words.range("f".."p").collect::<Vec<_>>()
    );

    // word -> position, keeping every occurrence in arrival order
    let mut positions: RbTree<(&str, usize), First> =
        RbTree::with_parts(First, Less, Pool::new());
    for (pos, word) in text.split_whitespace().enumerate() {
        let _ignore = positions.insert_equal((word, pos)).unwrap();
    }
    let (first, last) = positions.equal_range(&"the");
    let at: Vec<_> = positions.cursor_range(first, last).map(|p| p.1).collect();
    println!("'the' occurs {} times at {at:?}", positions.count(&"the"));

    positions.validate().unwrap();
    println!("pool: {:?}", positions.pool().stats());

    words.clear();
    positions.clear();
}
