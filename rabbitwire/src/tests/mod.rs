mod mock;

mod options;
