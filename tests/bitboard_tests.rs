use broadside::{BitBoard, BitBoardError};

#[test]
fn test_get_set_clear() {
    let mut bb = BitBoard::<u16, 4>::new();
    assert!(bb.is_empty());

    bb.set(1, 1).unwrap();
    assert!(bb.get(1, 1).unwrap());
    assert_eq!(bb.count_ones(), 1);

    bb.clear(1, 1).unwrap();
    assert!(!bb.get(1, 1).unwrap());
    assert!(bb.is_empty());
}

#[test]
fn test_out_of_range_is_an_error_for_get_but_not_contains() {
    let mut bb = BitBoard::<u128, 10>::new();
    assert_eq!(
        bb.set(10, 0),
        Err(BitBoardError::IndexOutOfBounds { row: 10, col: 0 })
    );
    assert!(bb.get(0, 10).is_err());
    assert!(!bb.contains(0, 10));
    assert!(!bb.contains(99, 99));
}

#[test]
fn test_from_cells_and_iter_row_major() {
    let bb = BitBoard::<u16, 4>::from_cells([(3, 3), (0, 1), (2, 0)]).unwrap();
    let cells: Vec<_> = bb.iter().collect();
    assert_eq!(cells, vec![(0, 1), (2, 0), (3, 3)]);
}

#[test]
fn test_not_stays_on_the_board() {
    let bb = BitBoard::<u128, 10>::from_cells([(0, 0)]).unwrap();
    let rest = !bb;
    assert_eq!(rest.count_ones(), 99);
    assert!(!rest.contains(0, 0));
    assert_eq!(BitBoard::<u128, 10>::full().count_ones(), 100);
}

#[test]
fn test_halo_clips_at_edges() {
    let corner = BitBoard::<u128, 10>::from_cells([(0, 0)]).unwrap();
    let halo = corner.halo();
    assert_eq!(halo.count_ones(), 4);
    assert!(halo.contains(1, 1));

    let middle = BitBoard::<u128, 10>::from_cells([(5, 5), (5, 6)]).unwrap();
    assert_eq!(middle.halo().count_ones(), 12);
}

#[test]
fn test_set_operators() {
    let a = BitBoard::<u16, 4>::from_cells([(0, 0), (1, 1)]).unwrap();
    let b = BitBoard::<u16, 4>::from_cells([(1, 1), (2, 2)]).unwrap();
    assert_eq!((a & b).iter().collect::<Vec<_>>(), vec![(1, 1)]);
    assert_eq!((a | b).count_ones(), 3);
    let mut c = a;
    c |= b;
    assert_eq!(c, a | b);
}
