use crate::arena::PartId;

/// Packed cell index: `(y mod size) * size + (x mod size)`.
pub type Coord = u32;

/// Cardinal directions as used by the genome: 0 = +x, 1 = +y, 2 = -x, 3 = -y.
pub const DIRECTIONS: [u8; 4] = [0, 1, 2, 3];

/// Square toroidal occupancy buffer, side `2^pow`. Each cell holds at most one part.
#[derive(Clone, Debug)]
pub struct Grid {
    pow: u32,
    mask: i64,
    cells: Vec<Option<PartId>>,
}

impl Grid {
    pub fn new(pow: u32) -> Self {
        let size = 1usize << pow;
        Self {
            pow,
            mask: (size as i64) - 1,
            cells: vec![None; size * size],
        }
    }

    pub fn size(&self) -> u32 {
        1 << self.pow
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Wraps any signed pair onto the torus; never rejects input.
    pub fn coord_of(&self, x: i64, y: i64) -> Coord {
        (((y & self.mask) << self.pow) | (x & self.mask)) as Coord
    }

    pub fn x_of(&self, coord: Coord) -> u32 {
        coord & self.mask as u32
    }

    pub fn y_of(&self, coord: Coord) -> u32 {
        (coord >> self.pow) & self.mask as u32
    }

    /// One toroidal step in `direction` (taken mod 4).
    pub fn move_coord(&self, coord: Coord, direction: u8) -> Coord {
        let x = self.x_of(coord) as i64;
        let y = self.y_of(coord) as i64;
        match direction & 0x3 {
            0 => self.coord_of(x + 1, y),
            1 => self.coord_of(x, y + 1),
            2 => self.coord_of(x - 1, y),
            _ => self.coord_of(x, y - 1),
        }
    }

    pub fn neighbors(&self, coord: Coord) -> [Coord; 4] {
        DIRECTIONS.map(|d| self.move_coord(coord, d))
    }

    pub fn get(&self, coord: Coord) -> Option<PartId> {
        self.cells[self.index(coord)]
    }

    /// Installs `part` (or clears the cell) and returns the previous occupant.
    pub(crate) fn set(&mut self, coord: Coord, part: Option<PartId>) -> Option<PartId> {
        let idx = self.index(coord);
        std::mem::replace(&mut self.cells[idx], part)
    }

    pub fn occupied(&self) -> usize {
        self.cells.iter().filter(|c| c.is_some()).count()
    }

    fn index(&self, coord: Coord) -> usize {
        coord as usize & (self.cells.len() - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packs_and_unpacks_coordinates() {
        let grid = Grid::new(7);
        let size = grid.size() as i64;
        assert_eq!(grid.x_of(1), 1);
        assert_eq!(grid.y_of(1), 0);
        assert_eq!(grid.x_of((size + 17) as Coord), 17);
        assert_eq!(grid.y_of((size + 17) as Coord), 1);
        assert_eq!(grid.coord_of(17, 1), (size + 17) as Coord);
    }

    #[test]
    fn coordinates_wrap_instead_of_failing() {
        let grid = Grid::new(5);
        let size = grid.size() as i64;
        assert_eq!(grid.coord_of(-1, 0), grid.coord_of(size - 1, 0));
        assert_eq!(grid.coord_of(size, size), grid.coord_of(0, 0));
        assert_eq!(grid.coord_of(3 * size + 2, -size - 1), grid.coord_of(2, size - 1));
    }

    #[test]
    fn moves_wrap_at_the_far_edges() {
        let grid = Grid::new(7);
        let last = grid.size() as i64 - 1;
        assert_eq!(
            grid.move_coord(grid.coord_of(last, last), 0),
            grid.coord_of(0, last)
        );
        assert_eq!(
            grid.move_coord(grid.coord_of(last, last), 1),
            grid.coord_of(last, 0)
        );
        assert_eq!(grid.move_coord(grid.coord_of(0, 0), 2), grid.coord_of(last, 0));
        assert_eq!(grid.move_coord(grid.coord_of(0, 0), 3), grid.coord_of(0, last));
    }

    #[test]
    fn cardinal_loop_returns_to_origin_everywhere() {
        let grid = Grid::new(4);
        for c in 0..grid.len() as Coord {
            let looped = grid.move_coord(
                grid.move_coord(grid.move_coord(grid.move_coord(c, 0), 1), 2),
                3,
            );
            assert_eq!(looped, c);
        }
    }

    #[test]
    fn set_returns_previous_occupant() {
        let mut grid = Grid::new(3);
        let c = grid.coord_of(2, 5);
        assert_eq!(grid.set(c, Some(PartId(4))), None);
        assert_eq!(grid.set(c, Some(PartId(9))), Some(PartId(4)));
        assert_eq!(grid.get(c), Some(PartId(9)));
        assert_eq!(grid.occupied(), 1);
    }
}
