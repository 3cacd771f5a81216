pub mod direction;
pub mod inspect;
pub mod output;
pub mod overprediction;
pub mod report;
