mod lyrics;
mod playback;
mod restore;
