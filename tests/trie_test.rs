//! Integration tests for the persistent trie

use burrow::trie::Trie;

#[test]
fn test_put_then_get() {
    let trie = Trie::new().put("abc", 1u32);
    assert_eq!(trie.get::<u32>("abc"), Some(&1));
}

#[test]
fn test_get_with_wrong_type_is_empty() {
    let trie = Trie::new().put("abc", 1u32);
    assert_eq!(trie.get::<u32>("abc"), Some(&1));
    assert_eq!(trie.get::<String>("abc"), None);
}

#[test]
fn test_unrelated_keys_are_independent() {
    let trie = Trie::new()
        .put("alpha", 1u32)
        .put("beta", String::from("two"));
    assert_eq!(trie.get::<u32>("alpha"), Some(&1));
    assert_eq!(trie.get::<String>("beta"), Some(&String::from("two")));
}

#[test]
fn test_put_preserves_old_snapshot() {
    let t1 = Trie::new().put("key", 1u32);
    let t2 = t1.put("key", 2u32);
    let t3 = t2.put("other", 3u32);

    assert_eq!(t1.get::<u32>("key"), Some(&1));
    assert_eq!(t1.get::<u32>("other"), None);
    assert_eq!(t2.get::<u32>("key"), Some(&2));
    assert_eq!(t2.get::<u32>("other"), None);
    assert_eq!(t3.get::<u32>("key"), Some(&2));
    assert_eq!(t3.get::<u32>("other"), Some(&3));
}

#[test]
fn test_put_remove_restores_key_set() {
    let base = Trie::new().put("a", 1u32).put("ab", 2u32);
    let round_trip = base.put("abc", 3u32).remove("abc");

    assert_eq!(round_trip.get::<u32>("a"), Some(&1));
    assert_eq!(round_trip.get::<u32>("ab"), Some(&2));
    assert_eq!(round_trip.get::<u32>("abc"), None);
}

#[test]
fn test_remove_absent_key_returns_original() {
    let trie = Trie::new().put("a", 1u32);
    assert!(trie.remove("b") == trie);
    assert!(trie.remove("aa") == trie);
}

#[test]
fn test_remove_keeps_interior_node_with_descendants() {
    // removing "a" must keep a plain node at 'a' because "ab" runs
    // through it
    let trie = Trie::new().put("a", 1u32).put("ab", 2u32);
    let removed = trie.remove("a");

    assert_eq!(removed.get::<u32>("a"), None);
    assert_eq!(removed.get::<u32>("ab"), Some(&2));
}

#[test]
fn test_remove_prunes_empty_spine() {
    let trie = Trie::new().put("abc", 1u32);
    assert!(trie.remove("abc").is_empty());
}

#[test]
fn test_remove_prunes_up_to_surviving_value() {
    let trie = Trie::new().put("a", 1u32).put("abc", 2u32);
    let removed = trie.remove("abc");

    assert_eq!(removed.get::<u32>("a"), Some(&1));
    assert_eq!(removed.get::<u32>("abc"), None);
    // adding back under the pruned spine still works
    let again = removed.put("ab", 9u32);
    assert_eq!(again.get::<u32>("ab"), Some(&9));
}

#[test]
fn test_structural_sharing_off_the_spine() {
    let t1 = Trie::new().put("shared", 10u32).put("mine", 20u32);
    let t2 = t1.put("mine", 30u32);

    // the subtree not on the rewritten spine is aliased, so both tries
    // hand back the very same value allocation
    let a = t1.get::<u32>("shared").unwrap();
    let b = t2.get::<u32>("shared").unwrap();
    assert!(std::ptr::eq(a, b));
}

#[test]
fn test_empty_key() {
    let trie = Trie::new().put("", 7u32).put("x", 8u32);
    assert_eq!(trie.get::<u32>(""), Some(&7));

    let removed = trie.remove("");
    assert_eq!(removed.get::<u32>(""), None);
    assert_eq!(removed.get::<u32>("x"), Some(&8));

    let only_root = Trie::new().put("", 7u32);
    assert!(only_root.remove("").is_empty());
}

#[test]
fn test_non_copyable_values() {
    let trie = Trie::new().put("boxed", Box::new(5u32));
    assert_eq!(trie.get::<Box<u32>>("boxed").map(|b| **b), Some(5));
}
