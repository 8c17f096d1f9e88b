mod map;
mod merge;
mod take;

pub(crate) use map::MapSubscriber;
pub(crate) use merge::MergeSubscriber;
pub(crate) use take::TakeSubscriber;
