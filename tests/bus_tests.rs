//! Integration tests for the cycle-partitioned buffered bus.

use riscv_pipesim::core::bus::BufferedBus;

/// Tests that entries added in cycle c are invisible until a later connect.
#[test]
fn test_bus_cycle_visibility() {
    let mut bus: BufferedBus<i32> = BufferedBus::new(2, 2);
    bus.connect(1);
    bus.add(10, 1);
    assert!(!bus.can_get());
    assert_eq!(bus.get(), None);

    bus.connect(2);
    assert!(bus.can_get());
    assert_eq!(bus.get(), Some(10));
    assert_eq!(bus.get(), None);
}

/// Tests FIFO delivery across cycles.
#[test]
fn test_bus_fifo_order() {
    let mut bus: BufferedBus<i32> = BufferedBus::new(2, 2);
    bus.connect(1);
    bus.add(1, 1);
    bus.add(2, 1);
    bus.connect(2);
    bus.add(3, 2);
    assert_eq!(bus.get(), Some(1));
    assert_eq!(bus.get(), Some(2));
    assert_eq!(bus.get(), None);
    bus.connect(3);
    assert_eq!(bus.get(), Some(3));
}

/// Tests the per-cycle add budget.
#[test]
fn test_bus_in_budget() {
    let mut bus: BufferedBus<i32> = BufferedBus::new(2, 2);
    bus.connect(1);
    assert!(bus.can_add());
    bus.add(1, 1);
    assert!(bus.can_add());
    bus.add(2, 1);
    assert!(!bus.can_add());

    bus.connect(2);
    assert!(bus.can_add());
}

/// Tests the per-cycle get budget.
#[test]
fn test_bus_out_budget() {
    let mut bus: BufferedBus<i32> = BufferedBus::new(3, 2);
    bus.connect(1);
    bus.add(1, 1);
    bus.add(2, 1);
    bus.add(3, 1);
    bus.connect(2);
    assert_eq!(bus.get(), Some(1));
    assert_eq!(bus.get(), Some(2));
    // Budget exhausted even though an entry is ready.
    assert_eq!(bus.get(), None);
    bus.connect(3);
    assert_eq!(bus.get(), Some(3));
}

/// Tests that capacity bounds what can sit in transit.
#[test]
fn test_bus_capacity_backpressure() {
    let mut bus: BufferedBus<i32> = BufferedBus::new(2, 2);
    bus.connect(1);
    bus.add(1, 1);
    bus.add(2, 1);
    // Consumer never drains; producer fills the remaining capacity.
    bus.connect(2);
    bus.add(3, 2);
    bus.add(4, 2);
    bus.connect(3);
    assert!(!bus.can_add());
}

/// Tests clean and emptiness.
#[test]
fn test_bus_clean() {
    let mut bus: BufferedBus<i32> = BufferedBus::new(2, 2);
    bus.connect(1);
    bus.add(1, 1);
    bus.connect(2);
    bus.add(2, 2);
    assert!(!bus.is_empty());
    assert_eq!(bus.pending_read(), 1);

    bus.clean();
    assert!(bus.is_empty());
    assert_eq!(bus.get(), None);
}
