mod helpers;
mod search;
