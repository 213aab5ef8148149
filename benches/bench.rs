use chrono::Utc;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use creditboard::identity::{generate_display_name, hash_identity};
use creditboard::models::{build_comment_tree, Comment};

fn comments(threads: i32, replies: i32) -> Vec<Comment> {
    let mut comments = Vec::new();
    let mut id = 0;

    for _ in 0..threads {
        id += 1;
        let parent = id;
        comments.push(comment(id, None));

        for _ in 0..replies {
            id += 1;
            comments.push(comment(id, Some(parent)));
        }
    }

    comments
}

fn comment(id: i32, parent_id: Option<i32>) -> Comment {
    Comment {
        id,
        post_id: 1,
        parent_id,
        content: "bench".into(),
        author_nickname: "bench".into(),
        author_ip_hash: String::new(),
        like_count: 0,
        is_deleted: false,
        created_at: Utc::now(),
    }
}

pub fn bench_identity(c: &mut Criterion) {
    c.bench_function("hash identity", |b| {
        b.iter(|| hash_identity(black_box("203.0.113.7"), black_box("bench-salt-1234")))
    });

    c.bench_function("display name", |b| b.iter(generate_display_name));
}

pub fn bench_comment_tree(c: &mut Criterion) {
    let flat = comments(50, 10);

    c.bench_function("comment tree", |b| {
        b.iter(|| build_comment_tree(black_box(flat.clone())))
    });
}

criterion_group!(benches, bench_identity, bench_comment_tree);
criterion_main!(benches);
