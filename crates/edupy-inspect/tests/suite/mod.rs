mod barrier;
mod concurrency;
mod graph;
mod support;
mod variables;
