use serde::{Deserialize, Serialize};

/// Play direction. Travels on the wire as `1` / `-1`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "i8", try_from = "i8")]
pub enum Direction {
    #[default]
    Forward,
    Backward,
}

impl Direction {
    pub fn step(self) -> isize {
        match self {
            Direction::Forward => 1,
            Direction::Backward => -1,
        }
    }

    pub fn flipped(self) -> Self {
        match self {
            Direction::Forward => Direction::Backward,
            Direction::Backward => Direction::Forward,
        }
    }
}

impl From<Direction> for i8 {
    fn from(direction: Direction) -> Self {
        direction.step() as i8
    }
}

impl TryFrom<i8> for Direction {
    type Error = String;

    fn try_from(raw: i8) -> Result<Self, Self::Error> {
        match raw {
            1 => Ok(Direction::Forward),
            -1 => Ok(Direction::Backward),
            other => Err(format!("direction must be 1 or -1, got {other}")),
        }
    }
}

/// `(from + direction + n) mod n`.
pub fn next_index(from: usize, direction: Direction, player_count: usize) -> usize {
    if player_count == 0 {
        return 0;
    }
    let n = player_count as isize;
    ((from as isize + direction.step()).rem_euclid(n)) as usize
}

/// Whose turn it is and which way play is moving. The roster itself lives on
/// the match and does not change during a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnState {
    pub current_player_index: usize,
    pub direction: Direction,
    pub player_count: usize,
}

impl TurnState {
    pub fn new(player_count: usize) -> Self {
        Self {
            current_player_index: 0,
            direction: Direction::Forward,
            player_count,
        }
    }

    pub fn next_index(&self) -> usize {
        self.next_from(self.current_player_index)
    }

    pub fn next_from(&self, from: usize) -> usize {
        next_index(from, self.direction, self.player_count)
    }

    /// The player after the next one; the next player's turn is skipped.
    pub fn skip_index(&self) -> usize {
        self.next_from(self.next_index())
    }

    /// Direction after a reverse and the player who moves next under it.
    /// Advances once from the current index, so with two players the turn
    /// still goes to the other player.
    pub fn reversed(&self) -> (Direction, usize) {
        let direction = self.direction.flipped();
        (
            direction,
            next_index(self.current_player_index, direction, self.player_count),
        )
    }

    pub fn advance(&mut self) {
        self.current_player_index = self.next_index();
    }

    pub fn is_turn_of(&self, index: usize) -> bool {
        self.current_player_index == index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_next_index_wraps_both_ways() {
        assert_eq!(next_index(3, Direction::Forward, 4), 0);
        assert_eq!(next_index(0, Direction::Backward, 4), 3);
        assert_eq!(next_index(1, Direction::Backward, 4), 0);
    }

    #[test]
    fn test_skip_index_jumps_one_player() {
        let turn = TurnState::new(4);
        assert_eq!(turn.skip_index(), 2);

        let mut backward = TurnState::new(4);
        backward.direction = Direction::Backward;
        assert_eq!(backward.skip_index(), 2);
        backward.current_player_index = 1;
        assert_eq!(backward.skip_index(), 3);
    }

    #[test]
    fn test_reverse_with_three_players() {
        let mut turn = TurnState::new(3);
        turn.current_player_index = 1;
        let (direction, next) = turn.reversed();
        assert_eq!(direction, Direction::Backward);
        assert_eq!(next, 0);
    }

    #[test]
    fn test_reverse_with_two_players_moves_to_other_player() {
        for current in 0..2 {
            for direction in [Direction::Forward, Direction::Backward] {
                let turn = TurnState {
                    current_player_index: current,
                    direction,
                    player_count: 2,
                };
                let (new_direction, next) = turn.reversed();
                assert_eq!(new_direction, direction.flipped());
                assert_ne!(next, current);
            }
        }
    }

    #[test]
    fn test_direction_wire_format() {
        assert_eq!(serde_json::to_string(&Direction::Backward).unwrap(), "-1");
        let forward: Direction = serde_json::from_str("1").unwrap();
        assert_eq!(forward, Direction::Forward);
        assert!(serde_json::from_str::<Direction>("2").is_err());
    }

    proptest! {
        #[test]
        fn turn_order_is_cyclic(n in 1usize..12, start in 0usize..12, backward in any::<bool>()) {
            let start = start % n;
            let direction = if backward { Direction::Backward } else { Direction::Forward };
            let mut index = start;
            for step in 1..=n {
                index = next_index(index, direction, n);
                if step < n {
                    prop_assert_ne!(index, start);
                }
            }
            prop_assert_eq!(index, start);
        }

        #[test]
        fn reverse_never_returns_to_reverser_with_two_players(current in 0usize..2, backward in any::<bool>()) {
            let turn = TurnState {
                current_player_index: current,
                direction: if backward { Direction::Backward } else { Direction::Forward },
                player_count: 2,
            };
            let (_, next) = turn.reversed();
            prop_assert_eq!(next, 1 - current);
        }
    }
}
