mod calibration_props;
mod command_store;
mod dark_hole_loop;
mod howfs_cycle;
