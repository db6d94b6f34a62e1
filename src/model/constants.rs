// Default board parameters
pub const MU: f64 = 25.0;
pub const SIGMA: f64 = MU / 3.0;
pub const BETA: f64 = SIGMA / 2.0;
pub const TAU: f64 = SIGMA / 100.0;
pub const DRAW_PROBABILITY: f64 = 0.10;
pub const MIN_TEAMS: u32 = 2;
pub const MIN_PLAYERS_PER_TEAM: u32 = 1;
// Plackett-Luce variance floor
pub const KAPPA: f64 = 0.0001;
