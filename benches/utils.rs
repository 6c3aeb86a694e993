use indexmap::IndexMap;
use liqueur::{IntoValue, Value};
use rand::{Rng, SeedableRng, rngs::StdRng};

/// Generate n random contexts to use in the benchmark
pub fn generate_random_contexts(n: usize) -> Vec<Vec<(&'static str, Value)>> {
    let mut rng = StdRng::seed_from_u64(42); // Fixed seed for reproducibility
    let mut contexts = Vec::with_capacity(n);

    for _ in 0..n {
        let mut user = IndexMap::new();
        user.insert("name".to_string(), random_string(&mut rng, 5, 10).into_value());
        user.insert("age".to_string(), rng.random_range(18_i64..80).into_value());
        user.insert("active".to_string(), rng.random_bool(0.7).into_value());

        let items_count = rng.random_range(3..10);
        let mut items = Vec::with_capacity(items_count);
        for _ in 0..items_count {
            let mut item = IndexMap::new();
            item.insert("name".to_string(), random_string(&mut rng, 3, 8).into_value());
            item.insert("value".to_string(), rng.random_range(10_i64..1000).into_value());
            item.insert("special".to_string(), rng.random_bool(0.3).into_value());
            items.push(item.into_value());
        }

        contexts.push(vec![("user", user.into_value()), ("items", items.into_value())]);
    }

    contexts
}

/// A template with `blocks` sibling blocks, each nested `depth` deep.
pub fn generate_template(blocks: usize, depth: usize) -> String {
    let mut template = String::new();
    for i in 0..blocks {
        for d in 0..depth {
            template.push_str(&format!("{{% if flag{d} %}}Line {i}.{d}: {{{{ user.name | upcase }}}}"));
        }
        template.push_str("{% else %}{% raw %}{{ untouched }}{% endraw %}{% comment %}skip{% endcomment %}");
        for _ in 0..depth {
            template.push_str("{% endif %}");
        }
        template.push('\n');
    }
    template
}

/// Generate a random string with length between min and max
fn random_string(rng: &mut StdRng, min_len: usize, max_len: usize) -> String {
    let charset = "abcdefghijklmnopqrstuvwxyz";
    let len = rng.random_range(min_len..=max_len);

    (0..len)
        .map(|_| {
            let idx = rng.random_range(0..charset.len());
            charset.chars().nth(idx).unwrap()
        })
        .collect()
}
