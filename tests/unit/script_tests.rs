//! Swap script assembly tests

use std::path::PathBuf;

use pretty_assertions::assert_eq;

use mysql_swapcopy::model::{ConstraintStore, TargetTables};
use mysql_swapcopy::script::{SwapScriptBuilder, DISABLE_FK_CHECKS, ENABLE_FK_CHECKS};
use mysql_swapcopy::{generate_swap_script, generate_swap_script_string};

fn targets(names: &[&str]) -> TargetTables {
    TargetTables::new(names.iter().copied()).unwrap()
}

fn dump_fixture(name: &str) -> String {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("dumps")
        .join(name);
    std::fs::read_to_string(&path).unwrap()
}

fn position(lines: &[&str], needle: &str) -> usize {
    lines
        .iter()
        .position(|l| l.starts_with(needle))
        .unwrap_or_else(|| panic!("No line starting with {:?}", needle))
}

// ============================================================================
// Builder
// ============================================================================

#[test]
fn test_preamble_drops_old_tables() {
    let tables = targets(&["orders", "order_items"]);
    assert_eq!(
        SwapScriptBuilder::new(&tables).preamble(),
        vec![
            "SET FOREIGN_KEY_CHECKS=0;",
            "DROP TABLE IF EXISTS `orders__swapold`;",
            "DROP TABLE IF EXISTS `order_items__swapold`;",
        ]
    );
}

#[test]
fn test_rename_statement_swaps_both_names() {
    let tables = targets(&["sales_order"]);
    assert_eq!(
        SwapScriptBuilder::new(&tables).rename_statement("sales_order"),
        "RENAME TABLE `sales_order` TO `sales_order__swapold`, `sales_order__swaptmp` TO `sales_order`;"
    );
}

#[test]
fn test_tables_without_constraints_only_rename() {
    let tables = targets(&["a", "b", "c"]);
    let statements = SwapScriptBuilder::new(&tables).swap_statements(&ConstraintStore::new());

    assert_eq!(statements.len(), 4);
    assert_eq!(
        statements.iter().filter(|s| s.starts_with("RENAME TABLE")).count(),
        3
    );
    assert!(!statements.iter().any(|s| s.starts_with("ALTER TABLE")));
    assert_eq!(statements.last().unwrap(), ENABLE_FK_CHECKS);
}

#[test]
fn test_constraint_drops_precede_all_additions() {
    let tables = targets(&["a", "b"]);
    let mut store = ConstraintStore::new();
    store.record("a", "CONSTRAINT `fk_a` FOREIGN KEY (`b_id`) REFERENCES `b` (`id`)");
    store.record("b", "CONSTRAINT `fk_b` FOREIGN KEY (`a_id`) REFERENCES `a` (`id`)");

    assert_eq!(
        SwapScriptBuilder::new(&tables).swap_statements(&store),
        vec![
            "RENAME TABLE `a` TO `a__swapold`, `a__swaptmp` TO `a`;",
            "RENAME TABLE `b` TO `b__swapold`, `b__swaptmp` TO `b`;",
            "ALTER TABLE `a__swapold` DROP FOREIGN KEY `fk_a`;",
            "ALTER TABLE `b__swapold` DROP FOREIGN KEY `fk_b`;",
            "ALTER TABLE `a` ADD CONSTRAINT `fk_a` FOREIGN KEY (`b_id`) REFERENCES `b` (`id`);",
            "ALTER TABLE `b` ADD CONSTRAINT `fk_b` FOREIGN KEY (`a_id`) REFERENCES `a` (`id`);",
            "SET FOREIGN_KEY_CHECKS=1;",
        ]
    );
}

#[test]
fn test_build_wraps_body() {
    let tables = targets(&["t"]);
    let script =
        SwapScriptBuilder::new(&tables).build("CREATE TABLE `t__swaptmp` (`id` int);", &ConstraintStore::new());
    assert_eq!(
        script,
        "SET FOREIGN_KEY_CHECKS=0;\n\
         DROP TABLE IF EXISTS `t__swapold`;\n\
         CREATE TABLE `t__swaptmp` (`id` int);\n\
         RENAME TABLE `t` TO `t__swapold`, `t__swaptmp` TO `t`;\n\
         SET FOREIGN_KEY_CHECKS=1;\n"
    );
}

// ============================================================================
// Full scripts
// ============================================================================

#[test]
fn test_orders_and_order_items_scenario() {
    let dump = r#"DROP TABLE IF EXISTS `orders`;
CREATE TABLE `orders` (
  `id` int NOT NULL,
  PRIMARY KEY (`id`)
) ENGINE=InnoDB;
DROP TABLE IF EXISTS `order_items`;
CREATE TABLE `order_items` (
  `id` int NOT NULL,
  `order_id` int NOT NULL,
  KEY `IDX_ORDER` (`order_id`),
  CONSTRAINT `FK_ITEM_ORDER` FOREIGN KEY (`order_id`) REFERENCES `orders` (`id`)
) ENGINE=InnoDB;
INSERT INTO `order_items` VALUES (1,1);
"#;
    let script = generate_swap_script_string(&targets(&["orders", "order_items"]), dump).unwrap();

    assert_eq!(
        script,
        r#"SET FOREIGN_KEY_CHECKS=0;
DROP TABLE IF EXISTS `orders__swapold`;
DROP TABLE IF EXISTS `order_items__swapold`;
DROP TABLE IF EXISTS `orders__swaptmp`;
CREATE TABLE `orders__swaptmp` (
  `id` int NOT NULL,
  PRIMARY KEY (`id`)
) ENGINE=InnoDB;
DROP TABLE IF EXISTS `order_items__swaptmp`;
CREATE TABLE `order_items__swaptmp` (
  `id` int NOT NULL,
  `order_id` int NOT NULL,
  KEY `IDX_ORDER` (`order_id`)
) ENGINE=InnoDB;
INSERT INTO `order_items__swaptmp` VALUES (1,1);
RENAME TABLE `orders` TO `orders__swapold`, `orders__swaptmp` TO `orders`;
RENAME TABLE `order_items` TO `order_items__swapold`, `order_items__swaptmp` TO `order_items`;
ALTER TABLE `order_items__swapold` DROP FOREIGN KEY `FK_ITEM_ORDER`;
ALTER TABLE `order_items` ADD CONSTRAINT `FK_ITEM_ORDER` FOREIGN KEY (`order_id`) REFERENCES `orders` (`id`);
SET FOREIGN_KEY_CHECKS=1;
"#
    );
}

#[test]
fn test_mysqldump_fixture_ordering() {
    let dump = dump_fixture("orders.sql");
    let script = generate_swap_script_string(&targets(&["orders", "order_items"]), &dump).unwrap();
    let lines: Vec<&str> = script.lines().collect();

    assert_eq!(lines.first().copied(), Some(DISABLE_FK_CHECKS));
    assert_eq!(lines.last().copied(), Some(ENABLE_FK_CHECKS));

    let drop_old = position(&lines, "DROP TABLE IF EXISTS `order_items__swapold`");
    let create_orders = position(&lines, "CREATE TABLE `orders__swaptmp`");
    let create_items = position(&lines, "CREATE TABLE `order_items__swaptmp`");
    let rename_orders = position(&lines, "RENAME TABLE `orders`");
    let rename_items = position(&lines, "RENAME TABLE `order_items`");
    let drop_fk = position(&lines, "ALTER TABLE `order_items__swapold` DROP FOREIGN KEY");
    let add_fk = position(&lines, "ALTER TABLE `order_items` ADD CONSTRAINT");

    assert!(drop_old < create_orders);
    assert!(create_orders < create_items);
    assert!(create_items < rename_orders);
    assert!(rename_orders < rename_items);
    assert!(rename_items < drop_fk);
    assert!(drop_fk < add_fk);

    // The member before the diverted constraint lost its comma
    assert_eq!(lines[create_items + 6], "  KEY `ORDER_ITEMS_ORDER_ID` (`order_id`)");
    assert!(lines[create_items + 7].starts_with(") ENGINE=InnoDB"));

    assert!(!script.contains("DEFINER="));
    assert!(script.contains("INSERT INTO `order_items__swaptmp` VALUES"));
}

#[test]
fn test_each_constraint_dropped_and_added_once() {
    let dump = dump_fixture("catalog.sql");
    let tables = targets(&["catalog_product_entity", "catalog_product_website"]);
    let script = generate_swap_script_string(&tables, &dump).unwrap();

    for name in [
        "CAT_PRD_ENTT_ATTR_SET_ID_EAV_ATTR_SET_ATTR_SET_ID",
        "CAT_PRD_WS_PRD_ID_CAT_PRD_ENTT_ENTT_ID",
        "CATALOG_PRODUCT_WEBSITE_WEBSITE_ID_STORE_WEBSITE_WEBSITE_ID",
    ] {
        let quoted = format!("`{}`", name);
        let drops = script
            .lines()
            .filter(|l| l.contains("DROP FOREIGN KEY") && l.contains(&quoted))
            .count();
        let adds = script
            .lines()
            .filter(|l| l.contains(" ADD CONSTRAINT") && l.contains(&quoted))
            .count();
        assert_eq!(drops, 1, "drops of {}", name);
        assert_eq!(adds, 1, "adds of {}", name);
        assert_eq!(script.matches(&quoted).count(), 2, "mentions of {}", name);
    }

    let add_website = script
        .lines()
        .find(|l| l.starts_with("ALTER TABLE `catalog_product_website` ADD"))
        .unwrap();
    assert_eq!(
        add_website,
        "ALTER TABLE `catalog_product_website` ADD CONSTRAINT `CAT_PRD_WS_PRD_ID_CAT_PRD_ENTT_ENTT_ID` \
         FOREIGN KEY (`product_id`) REFERENCES `catalog_product_entity` (`entity_id`) ON DELETE CASCADE, \
         ADD CONSTRAINT `CATALOG_PRODUCT_WEBSITE_WEBSITE_ID_STORE_WEBSITE_WEBSITE_ID` FOREIGN KEY \
         (`website_id`) REFERENCES `store_website` (`website_id`) ON DELETE CASCADE;"
    );
}

#[test]
fn test_generation_is_deterministic() {
    let dump = dump_fixture("catalog.sql");
    let tables = targets(&["catalog_product_entity", "catalog_product_website"]);
    let first = generate_swap_script_string(&tables, &dump).unwrap();
    let second = generate_swap_script_string(&tables, &dump).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_summary_counts() {
    let dump = dump_fixture("catalog.sql");
    let tables = targets(&["catalog_product_entity", "catalog_product_website"]);
    let (_, summary) = generate_swap_script(&tables, dump.as_bytes(), Vec::new()).unwrap();

    assert_eq!(summary.renames, 2);
    assert_eq!(summary.constraint_drops, 3);
    assert_eq!(summary.constraint_adds, 2);
    assert_eq!(
        summary.rewrite.tables,
        vec!["catalog_product_entity", "catalog_product_website"]
    );
}
